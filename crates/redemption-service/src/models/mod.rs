//! 兑换服务领域模型
//!
//! 包含品牌、代金券、客户与兑换记录的实体定义

pub mod customer;
pub mod enums;
pub mod redemption;
pub mod voucher;

pub use customer::Customer;
pub use enums::RedemptionStatus;
pub use redemption::{NewRedemption, NewRedemptionItem, Redemption, RedemptionItem};
pub use voucher::{Brand, Voucher, VoucherEligibility, validate_voucher};
