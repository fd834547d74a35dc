use serde::{Deserialize, Serialize};

/// When a target should be checked. Exactly one kind is active per target;
/// the tag keeps the two mutually exclusive at the serialization boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleSpec {
    Interval { minutes: u32 },
    Cron { expr: String },
}

impl ScheduleSpec {
    pub fn describe(&self) -> String {
        match self {
            ScheduleSpec::Interval { minutes } => format!("every {}m", minutes),
            ScheduleSpec::Cron { expr } => format!("cron {}", expr),
        }
    }
}

/// Rectangular region-of-interest for comparison, in pixel coordinates.
/// Only well-formed rectangles (right > left, bottom > top) take part in
/// comparison; anything else degrades to full-frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl RegionRect {
    pub fn is_well_formed(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Viewport width and the page-height cap applied at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderParams {
    pub viewport_width: u32,
    pub max_height: u32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            viewport_width: 1920,
            max_height: 15000,
        }
    }
}

/// Cookie as configured by the operator. `expiry` is float-tolerant since
/// browser exports often carry fractional epoch seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expiry: Option<f64>,
}

impl CookieSpec {
    /// Normalize for injection: expiry becomes integer epoch seconds,
    /// an absent expiry stays absent.
    pub fn normalized(&self) -> BrowserCookie {
        BrowserCookie {
            name: self.name.clone(),
            value: self.value.clone(),
            domain: self.domain.clone(),
            path: self.path.clone(),
            expiry_epoch: self.expiry.map(|e| e as i64),
        }
    }
}

/// Cookie in the form the render session injects it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expiry_epoch: Option<i64>,
}

/// How a target authenticates before capture.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthSpec {
    #[default]
    None,
    Cookies {
        cookies: Vec<CookieSpec>,
    },
    Credentials {
        username: String,
        password: String,
        username_selector: String,
        password_selector: String,
        submit_selector: String,
    },
}

impl AuthSpec {
    /// A descriptor missing required fields degrades to no-authentication
    /// at run time; the caller logs the degradation.
    pub fn is_complete(&self) -> bool {
        match self {
            AuthSpec::None => true,
            AuthSpec::Cookies { cookies } => {
                !cookies.is_empty() && cookies.iter().all(|c| !c.name.is_empty())
            }
            AuthSpec::Credentials {
                username,
                username_selector,
                password_selector,
                submit_selector,
                ..
            } => {
                !username.is_empty()
                    && !username_selector.is_empty()
                    && !password_selector.is_empty()
                    && !submit_selector.is_empty()
            }
        }
    }
}
