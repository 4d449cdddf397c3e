//! Resource paths of the VOS management API.

pub const PREFIX: &str = "/external/server";

// Near-real-time
pub const GET_PHONE_ONLINE: &str = "/external/server/GetPhoneOnline";
pub const GET_ALL_PHONE_ONLINE: &str = "/external/server/GetAllPhoneOnline";
pub const GET_CURRENT_CALL: &str = "/external/server/GetCurrentCall";
pub const GET_GATEWAY_MAPPING_ONLINE: &str = "/external/server/GetGatewayMappingOnline";
pub const GET_GATEWAY_ROUTING_ONLINE: &str = "/external/server/GetGatewayRoutingOnline";
pub const GET_PERFORMANCE: &str = "/external/server/GetPerformance";
pub const GET_ALARM_CURRENT: &str = "/external/server/GetAlarmCurrent";

// Rosters
pub const GET_ALL_CUSTOMERS: &str = "/external/server/GetAllCustomers";
pub const GET_CUSTOMER: &str = "/external/server/GetCustomer";
pub const GET_PHONE: &str = "/external/server/GetPhone";

// Historical
pub const GET_CDR: &str = "/external/server/GetCdr";
pub const GET_PAY_HISTORY: &str = "/external/server/GetPayHistory";
pub const GET_CONSUMPTION: &str = "/external/server/GetConsumption";

// Configuration
pub const GET_GATEWAY_MAPPING: &str = "/external/server/GetGatewayMapping";
pub const GET_GATEWAY_ROUTING: &str = "/external/server/GetGatewayRouting";
pub const GET_FEE_RATE_GROUP: &str = "/external/server/GetFeeRateGroup";
pub const GET_FEE_RATE: &str = "/external/server/GetFeeRate";
pub const GET_SUITE: &str = "/external/server/GetSuite";
pub const GET_SOFT_SWITCH: &str = "/external/server/GetSoftSwitch";
pub const GET_E164_CONVERT: &str = "/external/server/GetE164Convert";
pub const GET_IVR_AUDIO: &str = "/external/server/GetIvrAudio";

/// Normalizes a resource path: trims whitespace, guarantees a single leading
/// slash and drops trailing slashes.
///
/// Bare API names (`GetCdr`) are expanded under [`PREFIX`].
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else if trimmed.contains('/') {
        format!("/{}", trimmed)
    } else {
        format!("{}/{}", PREFIX, trimmed)
    }
}

/// API name of a resource path (its last segment).
pub fn api_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
