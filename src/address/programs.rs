//! Well-known program ids referenced by stake instructions.

use solana_sdk::pubkey::Pubkey;

/// SPL Token program.
pub const TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// SPL Associated Token Account program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hXZbpYWXxGXEXH1xPhk7bu8kz");

/// System program.
pub const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::system_program::ID;

/// Rent sysvar.
pub const RENT_SYSVAR_ID: Pubkey = solana_sdk::sysvar::rent::ID;
