/// Order Validator - Admission Rule Validation
///
/// This module turns a raw `OrderRequest` into an `OrderTicket` whose fields
/// are known to be well-formed. Nothing is persisted or published for a
/// request that fails here.
///
/// ## Validation Rules
/// - Symbol must not be empty (and must be allowed, if a list is configured)
/// - Side must be BUY or SELL, type must be MARKET or LIMIT
/// - Quantity must be a positive integer (not above the configured maximum)
/// - Price must be non-negative
///
/// ## Usage
/// ```rust
/// use order_stream::domain::validation::OrderValidator;
/// use order_stream::shared::protocol::OrderRequest;
/// use rust_decimal::Decimal;
///
/// let request = OrderRequest {
///     symbol: "TCS".to_string(),
///     side: "BUY".to_string(),
///     order_type: "MARKET".to_string(),
///     quantity: 10,
///     price: Decimal::ZERO,
/// };
///
/// let validator = OrderValidator::new();
/// let ticket = validator.validate(&request).unwrap();
/// assert_eq!(ticket.quantity, 10);
/// ```

use crate::shared::protocol::{OrderRequest, OrderType, Side};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Symbol is empty or not allowed
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Side is neither BUY nor SELL
    #[error("invalid side: {0}")]
    InvalidSide(String),

    /// Type is neither MARKET nor LIMIT
    #[error("invalid order type: {0}")]
    InvalidOrderType(String),

    /// Quantity is zero or negative
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Quantity exceeds the configured maximum
    #[error("quantity out of range: {0}")]
    QuantityOutOfRange(String),

    /// Price is negative
    #[error("invalid price: {0}")]
    InvalidPrice(String),
}

/// Order validation configuration
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum quantity (inclusive)
    pub max_quantity: u64,

    /// Allowed symbols (empty means all symbols allowed)
    pub allowed_symbols: Vec<Arc<str>>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_quantity: u64::MAX,
            allowed_symbols: Vec::new(),
        }
    }
}

/// A request that passed validation, ready to be admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTicket {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: u64,
    pub price: Decimal,
}

/// Order validator
#[derive(Debug, Clone, Default)]
pub struct OrderValidator {
    config: ValidationConfig,
}

impl OrderValidator {
    /// Creates a new validator with default configuration
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    /// Creates a new validator with custom configuration
    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validates an order request
    ///
    /// Checks run in field order; the first failure is returned.
    pub fn validate(&self, request: &OrderRequest) -> Result<OrderTicket, ValidationError> {
        let symbol = self.validate_symbol(&request.symbol)?;

        let side = request
            .side
            .parse::<Side>()
            .map_err(|e| ValidationError::InvalidSide(e.to_string()))?;

        let order_type = request
            .order_type
            .parse::<OrderType>()
            .map_err(|e| ValidationError::InvalidOrderType(e.to_string()))?;

        let quantity = self.validate_quantity(request.quantity)?;
        let price = self.validate_price(request.price)?;

        Ok(OrderTicket {
            symbol,
            side,
            order_type,
            quantity,
            price,
        })
    }

    /// Validates the symbol
    fn validate_symbol(&self, symbol: &str) -> Result<String, ValidationError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(
                "Symbol cannot be empty".to_string(),
            ));
        }

        // If allowed_symbols is configured, check if symbol is in the list
        if !self.config.allowed_symbols.is_empty()
            && !self.config.allowed_symbols.iter().any(|s| s.as_ref() == symbol)
        {
            return Err(ValidationError::InvalidSymbol(format!(
                "Symbol '{}' is not in allowed list",
                symbol
            )));
        }

        Ok(symbol.to_string())
    }

    /// Validates the quantity
    fn validate_quantity(&self, quantity: i64) -> Result<u64, ValidationError> {
        if quantity <= 0 {
            return Err(ValidationError::InvalidQuantity(format!(
                "Quantity must be greater than zero, got {}",
                quantity
            )));
        }

        // quantity > 0 here, so the conversion is lossless
        let quantity = quantity.unsigned_abs();
        if quantity > self.config.max_quantity {
            return Err(ValidationError::QuantityOutOfRange(format!(
                "Quantity {} exceeds maximum {}",
                quantity, self.config.max_quantity
            )));
        }

        Ok(quantity)
    }

    /// Validates the price
    fn validate_price(&self, price: Decimal) -> Result<Decimal, ValidationError> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(ValidationError::InvalidPrice(format!(
                "Price must not be negative, got {}",
                price
            )));
        }

        Ok(price)
    }
}
