use anchor_lang::error_code;

#[error_code]
pub enum EscrowError {
    // 6000
    #[msg("AlreadyExists")]
    AlreadyExists,
    #[msg("NotFound")]
    NotFound,
    #[msg("InsufficientFunds")]
    InsufficientFunds,
    #[msg("InvalidAmount")]
    InvalidAmount,
    #[msg("TypeMismatch")]
    TypeMismatch,
    // 6005
    #[msg("Unauthorized")]
    Unauthorized,
    #[msg("InvalidIdentifier")]
    InvalidIdentifier,
    #[msg("AccountMismatch")]
    AccountMismatch,
    #[msg("VaultBalanceMismatch")]
    VaultBalanceMismatch,
    #[msg("IncorrectAccountInfoOwner")]
    IncorrectAccountInfoOwner,
}
