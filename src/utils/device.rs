use std::fmt;

/// Coarse categorization of the scanning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
            DeviceClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring heuristics over the raw user-agent string. Mobile markers are
/// checked first, then tablet, then desktop OS names.
pub fn classify_device(user_agent: &str) -> DeviceClass {
    if user_agent.contains("Mobile")
        || user_agent.contains("Android")
        || user_agent.contains("iPhone")
    {
        DeviceClass::Mobile
    } else if user_agent.contains("Tablet") || user_agent.contains("iPad") {
        DeviceClass::Tablet
    } else if user_agent.contains("Windows")
        || user_agent.contains("Macintosh")
        || user_agent.contains("Linux")
    {
        DeviceClass::Desktop
    } else {
        DeviceClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iphone_is_mobile() {
        assert_eq!(
            classify_device("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
            DeviceClass::Mobile
        );
    }

    #[test]
    fn ipad_is_tablet_not_mobile() {
        assert_eq!(
            classify_device("Mozilla/5.0 (iPad; CPU OS 16_0 like Mac OS X)"),
            DeviceClass::Tablet
        );
    }

    #[test]
    fn android_phone_beats_linux_marker() {
        assert_eq!(
            classify_device("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
            DeviceClass::Mobile
        );
    }

    #[test]
    fn windows_is_desktop() {
        assert_eq!(
            classify_device("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
            DeviceClass::Desktop
        );
    }

    #[test]
    fn unrecognized_agent_is_unknown() {
        assert_eq!(classify_device("curl/8.5.0"), DeviceClass::Unknown);
        assert_eq!(classify_device(""), DeviceClass::Unknown);
    }
}
