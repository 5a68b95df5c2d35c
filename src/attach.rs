//! UI attach negotiation.
//!
//! The engine's API version decides which UI extensions the driver asks
//! for. Versions the policy cannot classify are rejected before attach.

use rmpv::Value;
use serde::Serialize;

use crate::error::DriverError;
use crate::nvim::value::{arg, as_i64, map_get, string_map};
use crate::nvim::{NvimApi, Session};

/// Engine version triple reported by `nvim_get_api_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiVersion {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

impl ApiVersion {
    /// Extract the version from a `[channel_id, metadata]` reply.
    pub fn from_api_info(info: &Value) -> Result<Self, DriverError> {
        let parts = info
            .as_array()
            .ok_or_else(|| DriverError::decode("api info must be an array"))?;
        let metadata = arg(parts, 1, "api metadata")?;
        let version = map_get(metadata, "version")
            .ok_or_else(|| DriverError::decode("api metadata has no version"))?;
        let field = |name: &str| {
            map_get(version, name)
                .ok_or_else(|| DriverError::decode(format!("version has no {}", name)))
                .and_then(|v| as_i64(v, name))
        };
        Ok(Self {
            major: field("major")?,
            minor: field("minor")?,
            patch: field("patch")?,
        })
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// UI options requested on attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AttachCapabilities {
    pub rgb: bool,
    pub popupmenu_external: bool,
    pub ext_tabline: bool,
}

impl AttachCapabilities {
    /// Options map passed to `nvim_ui_attach`.
    pub fn to_options(&self) -> Value {
        let mut entries = vec![
            ("rgb", Value::from(self.rgb)),
            ("popupmenu_external", Value::from(self.popupmenu_external)),
        ];
        if self.ext_tabline {
            entries.push(("ext_tabline", Value::from(true)));
        }
        string_map(entries)
    }
}

/// Decide the capability set for an engine version.
///
/// Rules are checked in order; the first match wins.
pub fn negotiate(version: ApiVersion) -> Result<AttachCapabilities, DriverError> {
    let ApiVersion {
        major,
        minor,
        patch,
    } = version;

    if major >= 0 && minor >= 2 && patch >= 1 {
        Ok(AttachCapabilities {
            rgb: true,
            popupmenu_external: true,
            ext_tabline: true,
        })
    } else if major == 0 && minor == 2 {
        Ok(AttachCapabilities {
            rgb: true,
            popupmenu_external: true,
            ext_tabline: false,
        })
    } else {
        Err(DriverError::UnsupportedVersion {
            major,
            minor,
            patch,
        })
    }
}

/// Query the engine version, negotiate capabilities and attach as a UI
/// with the given grid size.
pub async fn attach<S: Session + ?Sized>(
    session: &S,
    cols: i64,
    rows: i64,
) -> Result<AttachCapabilities, DriverError> {
    let info = session.get_api_info().await?;
    let version = ApiVersion::from_api_info(&info)?;
    tracing::info!(%version, "Neovim API version");

    let capabilities = negotiate(version)?;
    tracing::debug!(?capabilities, cols, rows, "Attaching UI");

    session
        .ui_attach(cols, rows, capabilities.to_options())
        .await?;
    Ok(capabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvim::value::map_flag;
    use crate::testing::{api_info, RecordingSession};

    fn version(major: i64, minor: i64, patch: i64) -> ApiVersion {
        ApiVersion {
            major,
            minor,
            patch,
        }
    }

    #[test]
    fn test_negotiate_full_capabilities() {
        let caps = negotiate(version(0, 2, 1)).unwrap();
        assert_eq!(
            caps,
            AttachCapabilities {
                rgb: true,
                popupmenu_external: true,
                ext_tabline: true
            }
        );
        assert!(negotiate(version(1, 4, 3)).unwrap().ext_tabline);
    }

    #[test]
    fn test_negotiate_without_tabline() {
        let caps = negotiate(version(0, 2, 0)).unwrap();
        assert!(caps.rgb);
        assert!(caps.popupmenu_external);
        assert!(!caps.ext_tabline);
    }

    #[test]
    fn test_negotiate_unsupported() {
        assert!(matches!(
            negotiate(version(0, 1, 5)),
            Err(DriverError::UnsupportedVersion {
                major: 0,
                minor: 1,
                patch: 5
            })
        ));
        // patch 0 on a newer minor matches neither rule
        assert!(negotiate(version(0, 3, 0)).is_err());
    }

    #[test]
    fn test_options_omit_tabline_when_disabled() {
        let options = negotiate(version(0, 2, 0)).unwrap().to_options();
        assert!(map_flag(&options, "rgb"));
        assert!(map_flag(&options, "popupmenu_external"));
        assert!(map_get(&options, "ext_tabline").is_none());
    }

    #[test]
    fn test_version_from_api_info() {
        let v = ApiVersion::from_api_info(&api_info(0, 2, 2)).unwrap();
        assert_eq!(v, version(0, 2, 2));
        assert_eq!(v.to_string(), "0.2.2");
        assert!(ApiVersion::from_api_info(&Value::from("nope")).is_err());
    }

    #[tokio::test]
    async fn test_attach_sends_geometry_and_options() {
        let session = RecordingSession::new().reply("nvim_get_api_info", api_info(0, 2, 1));

        let caps = attach(&session, 80, 24).await.unwrap();
        assert!(caps.ext_tabline);

        let calls = session.calls_to("nvim_ui_attach");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], Value::from(80));
        assert_eq!(calls[0][1], Value::from(24));
        assert!(map_flag(&calls[0][2], "ext_tabline"));
    }

    #[tokio::test]
    async fn test_attach_unsupported_never_attaches() {
        let session = RecordingSession::new().reply("nvim_get_api_info", api_info(0, 1, 7));

        let result = attach(&session, 80, 24).await;
        assert!(matches!(result, Err(DriverError::UnsupportedVersion { .. })));
        assert!(session.calls_to("nvim_ui_attach").is_empty());
    }
}
