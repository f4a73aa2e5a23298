pub mod constants {
    pub const GROUP_CREATED: &str = "GROUP_CREATED";
    pub const MEMBER_ADDED: &str = "MEMBER_ADDED";
    pub const MEMBER_REMOVED: &str = "MEMBER_REMOVED";
    pub const MEMBER_ROLE_CHANGED: &str = "MEMBER_ROLE_CHANGED";
    pub const STRICT_SETTLEMENT_MODE_TOGGLED: &str = "STRICT_SETTLEMENT_MODE_TOGGLED";
    pub const EXPENSE_ADDED: &str = "EXPENSE_ADDED";
    pub const EXPENSE_UPDATED: &str = "EXPENSE_UPDATED";
    pub const EXPENSE_DELETED: &str = "EXPENSE_DELETED";
    pub const PAYMENT_RECORDED: &str = "PAYMENT_RECORDED";
    pub const PAYMENT_CONFIRMED: &str = "PAYMENT_CONFIRMED";
    pub const PAYMENT_VOIDED: &str = "PAYMENT_VOIDED";
    pub const COUNTERPARTY_CREATED: &str = "COUNTERPARTY_CREATED";
    pub const COUNTERPARTY_DELETED: &str = "COUNTERPARTY_DELETED";
    pub const KHATA_ENTRY_RECORDED: &str = "KHATA_ENTRY_RECORDED";
    pub const KHATA_ENTRY_EDITED: &str = "KHATA_ENTRY_EDITED";
    pub const KHATA_ENTRY_DELETED: &str = "KHATA_ENTRY_DELETED";
    pub const KHATA_RECOMPUTED: &str = "KHATA_RECOMPUTED";
}
