//! The SAML2 flag carried inside the scrape job's query parameters.
//!
//! The API has no boolean for SAML2 URL parameters. It multiplexes the flag
//! into the `params` map as `saml2: ["enabled"]` or `saml2: ["disabled"]`.

use std::collections::BTreeMap;

/// Query parameters sent with every scrape, multi-valued per key.
pub type Params = BTreeMap<String, Vec<String>>;

/// Parameter key holding the SAML2 flag.
pub const SAML2_KEY: &str = "saml2";
/// Encoded `true`.
pub const SAML2_ENABLED: &str = "enabled";
/// Encoded `false`.
pub const SAML2_DISABLED: &str = "disabled";

/// Encode the flag as its parameter value.
pub fn encode_saml2(enabled: bool) -> Vec<String> {
    let value = if enabled { SAML2_ENABLED } else { SAML2_DISABLED };
    vec![value.to_string()]
}

/// Decode a parameter value. Only exactly `["disabled"]` is false.
pub fn decode_saml2(values: &[String]) -> bool {
    !matches!(values, [only] if only == SAML2_DISABLED)
}

/// The flag as carried by `params`, or `None` when the key is not there.
pub fn saml2_from_params(params: Option<&Params>) -> Option<bool> {
    params
        .and_then(|p| p.get(SAML2_KEY))
        .map(|values| decode_saml2(values))
}

/// Set the flag in `params`, creating the map if needed and leaving every
/// other key untouched.
pub fn merge_saml2(params: &mut Option<Params>, enabled: bool) {
    params
        .get_or_insert_with(Params::new)
        .insert(SAML2_KEY.to_string(), encode_saml2(enabled));
}
