//! 地址验证模块
//!
//! 按钱包家族校验收款地址格式

use crate::domain::wallet_family::WalletFamily;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式
    ///
    /// # 参数
    /// - `family`: 钱包家族
    /// - `address`: 待验证的地址
    pub fn validate(family: WalletFamily, address: &str) -> bool {
        match family {
            WalletFamily::Evm => Self::validate_evm_address(address),
            WalletFamily::Solana => Self::validate_solana_address(address),
            WalletFamily::Bitcoin => Self::validate_bitcoin_address(address),
        }
    }

    /// 验证EVM地址（支持EIP-55 Checksum）
    fn validate_evm_address(address: &str) -> bool {
        let Some(hex_part) = address.strip_prefix("0x") else {
            return false;
        };

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 含大写字母时按 EIP-55 校验
        if hex_part.chars().any(|c| c.is_ascii_uppercase()) {
            return Self::verify_eip55_checksum(hex_part);
        }

        true
    }

    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let mut hasher = Keccak256::new();
        hasher.update(hex_part.to_lowercase().as_bytes());
        let hash = hasher.finalize();

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let hash_byte = hash[i / 2];
            let nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };
            ch.is_ascii_uppercase() == (nibble >= 8)
        })
    }

    /// 验证Solana地址（Base58编码，32字节）
    fn validate_solana_address(address: &str) -> bool {
        if address.len() < 32 || address.len() > 44 {
            return false;
        }

        matches!(bs58::decode(address).into_vec(), Ok(decoded) if decoded.len() == 32)
    }

    /// 验证Bitcoin地址
    /// - P2PKH: 以1开头
    /// - P2SH: 以3开头
    /// - Bech32 (SegWit): 以bc1开头
    fn validate_bitcoin_address(address: &str) -> bool {
        if address.starts_with('1') || address.starts_with('3') {
            return Self::validate_base58_bitcoin_address(address);
        }

        if address.to_lowercase().starts_with("bc1") {
            return Self::validate_bech32_address(address);
        }

        false
    }

    fn validate_base58_bitcoin_address(address: &str) -> bool {
        if address.len() < 26 || address.len() > 35 {
            return false;
        }
        if !address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return false;
        }

        // 版本字节 + 20 字节哈希 + 4 字节校验和
        matches!(bs58::decode(address).into_vec(), Ok(decoded) if decoded.len() == 25)
    }

    /// SegWit 地址：校验 bech32/bech32m 校验和、主网 HRP 与见证程序
    fn validate_bech32_address(address: &str) -> bool {
        match bech32::segwit::decode(address) {
            Ok((hrp, _version, program)) => hrp == bech32::hrp::BC && !program.is_empty(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_address_validation() {
        assert!(AddressValidator::validate(
            WalletFamily::Evm,
            "0x742d35cc6634c0532925a3b844bc9e7595f0beb6"
        ));
        // 正确 checksum
        assert!(AddressValidator::validate(
            WalletFamily::Evm,
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        ));

        // 错误 checksum
        assert!(!AddressValidator::validate(
            WalletFamily::Evm,
            "0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        ));
        assert!(!AddressValidator::validate(WalletFamily::Evm, "0x123"));
        assert!(!AddressValidator::validate(
            WalletFamily::Evm,
            "742d35cc6634c0532925a3b844bc9e7595f0beb6"
        ));
    }

    #[test]
    fn test_solana_address_validation() {
        assert!(AddressValidator::validate(
            WalletFamily::Solana,
            "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK"
        ));
        assert!(!AddressValidator::validate(WalletFamily::Solana, "invalid"));
        assert!(!AddressValidator::validate(
            WalletFamily::Solana,
            "0x742d35cc6634c0532925a3b844bc9e7595f0beb6"
        ));
    }

    #[test]
    fn test_bitcoin_address_validation() {
        assert!(AddressValidator::validate(
            WalletFamily::Bitcoin,
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        ));
        assert!(AddressValidator::validate(
            WalletFamily::Bitcoin,
            "3J98t1WpEZ73CNmYviecrnyiWrnqRhWNLy"
        ));
        assert!(AddressValidator::validate(
            WalletFamily::Bitcoin,
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        ));
        // 校验和错误
        assert!(!AddressValidator::validate(
            WalletFamily::Bitcoin,
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5"
        ));
        assert!(!AddressValidator::validate(WalletFamily::Bitcoin, "invalid"));
    }

    #[test]
    fn test_family_mismatch_rejected() {
        assert!(!AddressValidator::validate(
            WalletFamily::Bitcoin,
            "0x742d35cc6634c0532925a3b844bc9e7595f0beb6"
        ));
    }
}
