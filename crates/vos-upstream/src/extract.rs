//! Locating record lists inside VOS payloads.
//!
//! The management API wraps every list in a resource-specific field
//! (`infoCustomerBriefs`, `infoCdrs`, ...). Callers that only want "the
//! records" use [`records`], which looks up the known field first and
//! otherwise takes the first array-valued member.

use serde_json::Value;
use vos_core::paths;

/// Known list fields per resource path, in lookup order.
pub fn list_fields(path: &str) -> &'static [&'static str] {
    match paths::api_name(path) {
        "GetAllCustomers" => &["infoCustomerBriefs"],
        "GetCustomer" => &["infoCustomers"],
        "GetCdr" => &["infoCdrs", "cdrs", "CDRList"],
        "GetGatewayMapping" => &["infoGatewayMappings"],
        "GetGatewayRouting" => &["infoGatewayRoutings"],
        "GetGatewayMappingOnline" => &["infoGatewayMappingsOnline"],
        "GetGatewayRoutingOnline" => &["infoGatewayRoutingsOnline"],
        "GetPhone" => &["infoPhones"],
        "GetPhoneOnline" | "GetAllPhoneOnline" => &["infoPhoneOnlines"],
        "GetCurrentCall" => &["infoCurrentCalls"],
        "GetFeeRateGroup" => &["infoFeeRateGroups"],
        "GetFeeRate" => &["infoFeeRates"],
        "GetSuite" => &["infoSuites"],
        "GetPayHistory" => &["infoPayHistorys"],
        _ => &[],
    }
}

/// Records of a payload, preferring the given fields.
pub fn records_in<'a>(payload: &'a Value, preferred: &[&str]) -> &'a [Value] {
    let Some(object) = payload.as_object() else {
        return payload.as_array().map(Vec::as_slice).unwrap_or(&[]);
    };

    for field in preferred {
        if let Some(Value::Array(items)) = object.get(*field) {
            return items;
        }
    }

    object
        .values()
        .find_map(|value| value.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Records of a payload returned by `path`.
pub fn records<'a>(payload: &'a Value, path: &str) -> &'a [Value] {
    records_in(payload, list_fields(path))
}
