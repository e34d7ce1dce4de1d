/// 45Q carbon utilization credit computed from the methanol product.
pub mod incentives;
