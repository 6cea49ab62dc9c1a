//! User-agent to device class classification

use crate::analytics::models::DeviceClass;

/// Ordered classification rules; the first rule with a matching pattern wins.
///
/// iPad appears in both lists, so it classifies as mobile.
const DEVICE_RULES: &[(DeviceClass, &[&str])] = &[
    (
        DeviceClass::Mobile,
        &[
            "android",
            "webos",
            "iphone",
            "ipad",
            "ipod",
            "blackberry",
            "iemobile",
            "opera mini",
        ],
    ),
    (DeviceClass::Tablet, &["ipad", "tablet"]),
];

/// Classify a user agent into mobile, tablet or desktop
pub fn classify_device(user_agent: &str) -> DeviceClass {
    let ua = user_agent.to_lowercase();

    DEVICE_RULES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| ua.contains(p)))
        .map(|(class, _)| *class)
        .unwrap_or(DeviceClass::Desktop)
}
