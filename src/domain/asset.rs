//! 资产与金额换算
//!
//! 金额在领域内一律使用 `Decimal`，只在适配器边界换算为链上最小单位。

use std::str::FromStr;

use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 支持的最大精度（ERC-20 常见上限）
pub const MAX_DECIMALS: u32 = 18;

/// 展示余额时保留的小数位
const DISPLAY_DP: u32 = 6;

/// 最小单位转回 Decimal 时保留的小数位，避免超出 Decimal 的 28 位有效数字
const PARSE_FRACTION_DIGITS: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be positive, got {0}")]
    NonPositive(Decimal),

    #[error("amount {amount} has more fractional digits than the asset's {decimals} decimals")]
    TooPrecise { amount: Decimal, decimals: u32 },

    #[error("asset decimals {0} exceed the supported maximum of 18")]
    UnsupportedDecimals(u32),

    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// 转账或余额查询针对的资产
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Asset {
    /// 链原生币（BNB / ETH / BTC）
    Native { symbol: String, decimals: u32 },
    /// 合约代币（如 BEP-20 USDT）
    Token {
        symbol: String,
        contract: String,
        decimals: u32,
    },
}

impl Asset {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Native { symbol, .. } | Self::Token { symbol, .. } => symbol,
        }
    }

    pub fn decimals(&self) -> u32 {
        match self {
            Self::Native { decimals, .. } | Self::Token { decimals, .. } => *decimals,
        }
    }

    pub fn contract(&self) -> Option<&str> {
        match self {
            Self::Native { .. } => None,
            Self::Token { contract, .. } => Some(contract),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native { .. })
    }
}

/// 十进制金额 → 最小单位整数
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    if amount <= Decimal::ZERO {
        return Err(AmountError::NonPositive(amount));
    }

    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return Err(AmountError::TooPrecise { amount, decimals });
    }

    let mantissa = u128::try_from(normalized.mantissa())
        .map_err(|_| AmountError::OutOfRange(amount.to_string()))?;

    U256::from(mantissa)
        .checked_mul(U256::exp10((decimals - scale) as usize))
        .ok_or_else(|| AmountError::OutOfRange(amount.to_string()))
}

/// 最小单位整数 → 十进制金额
pub fn from_base_units(value: U256, decimals: u32) -> Result<Decimal, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }

    let digits = value.to_string();
    let decimals = decimals as usize;

    let (int_part, frac_part) = if digits.len() > decimals {
        let (i, f) = digits.split_at(digits.len() - decimals);
        (i.to_string(), f.to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
    };

    let frac_part: String = frac_part.chars().take(PARSE_FRACTION_DIGITS).collect();
    let literal = if frac_part.is_empty() {
        int_part
    } else {
        format!("{}.{}", int_part, frac_part)
    };

    Decimal::from_str(&literal).map_err(|e| AmountError::OutOfRange(format!("{}: {}", literal, e)))
}

/// 余额展示格式：最多 6 位小数，至少 2 位
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(DISPLAY_DP).normalize();
    if rounded.scale() < 2 {
        format!("{:.2}", rounded)
    } else {
        rounded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_usdt_tenth_in_base_units() {
        let units = to_base_units(dec("0.10"), 18).unwrap();
        assert_eq!(units, U256::exp10(17));
    }

    #[test]
    fn test_satoshi_conversion() {
        let units = to_base_units(dec("0.00012345"), 8).unwrap();
        assert_eq!(units, U256::from(12_345u64));
    }

    #[test]
    fn test_rejects_fractional_base_units() {
        let err = to_base_units(dec("0.000000001"), 8).unwrap_err();
        assert!(matches!(err, AmountError::TooPrecise { decimals: 8, .. }));
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(
            to_base_units(Decimal::ZERO, 18),
            Err(AmountError::NonPositive(_))
        ));
        assert!(matches!(
            to_base_units(dec("-1"), 18),
            Err(AmountError::NonPositive(_))
        ));
    }

    #[test]
    fn test_from_base_units() {
        let wei = U256::from_dec_str("1500000000000000000").unwrap();
        assert_eq!(from_base_units(wei, 18).unwrap(), dec("1.5"));

        let small = U256::from(42u64);
        assert_eq!(from_base_units(small, 8).unwrap(), dec("0.00000042"));

        assert_eq!(from_base_units(U256::zero(), 18).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
        assert_eq!(format_amount(dec("1.5")), "1.50");
        assert_eq!(format_amount(dec("0.123456789")), "0.123457");
        assert_eq!(format_amount(dec("12")), "12.00");
    }

    #[test]
    fn test_asset_serde_tagged() {
        let asset: Asset = serde_json::from_str(
            r#"{"kind":"token","symbol":"USDT","contract":"0x55d398326f99059fF775485246999027B3197955","decimals":18}"#,
        )
        .unwrap();
        assert_eq!(asset.symbol(), "USDT");
        assert!(!asset.is_native());
        assert_eq!(asset.decimals(), 18);
    }
}
