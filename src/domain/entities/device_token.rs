//! `DeviceToken` — registered/unregistered out-of-band, consumed by the
//! push-event publisher (§3, SPEC_FULL §11 push-notification supplement).

use crate::domain::value_objects::{DeviceTokenId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = crate::domain::value_objects::status::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "web" => Ok(Self::Web),
            other => Err(crate::domain::value_objects::status::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceToken {
    pub id: DeviceTokenId,
    pub user_id: UserId,
    pub token: String,
    pub platform: Platform,
}

impl DeviceToken {
    pub fn new(user_id: UserId, token: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: DeviceTokenId::new(),
            user_id,
            token: token.into(),
            platform,
        }
    }
}
