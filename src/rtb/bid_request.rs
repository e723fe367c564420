use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ad slot on offer. Invariant: exactly one of `banner`/`video`/`native`/`audio`
/// is set, and `id` is non-empty (enforced by the request validator, not by
/// this type — the wire format allows either to be momentarily absent while a
/// request is being assembled or deep-merged against a stored template).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    pub bidfloor: f64,
    #[serde(default = "default_currency")]
    pub bidfloorcur: String,
    pub tagid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Imp {
    pub fn media_type(&self) -> Option<MediaType> {
        if self.banner.is_some() {
            Some(MediaType::Banner)
        } else if self.video.is_some() {
            Some(MediaType::Video)
        } else if self.native.is_some() {
            Some(MediaType::Native)
        } else if self.audio.is_some() {
            Some(MediaType::Audio)
        } else {
            None
        }
    }

    /// Reads `ext.prebid.storedrequest.id`, used by the stored-config
    /// resolver to locate this impression's template.
    pub fn stored_request_id(&self) -> Option<&str> {
        self.ext
            .as_ref()?
            .pointer("/prebid/storedrequest/id")?
            .as_str()
    }

    /// Reads the per-bidder parameter subtree at `ext.prebid.bidder.<code>`.
    pub fn bidder_params<'a>(&'a self, code: &str) -> Option<&'a Value> {
        self.ext
            .as_ref()?
            .pointer(&format!("/prebid/bidder/{code}"))
    }

    /// The set of bidder codes targeted by this impression, read from the
    /// keys under `ext.prebid.bidder`.
    pub fn targeted_bidders(&self) -> Vec<String> {
        self.ext
            .as_ref()
            .and_then(|ext| ext.pointer("/prebid/bidder"))
            .and_then(Value::as_object)
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Banner,
    Video,
    Native,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Banner {
    pub w: Option<i32>,
    pub h: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Video {
    pub mimes: Vec<String>,
    pub minduration: Option<i32>,
    pub maxduration: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Native {
    pub request: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Audio {
    pub mimes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Geo {
    /// ISO-3166-1 alpha-3 country code.
    pub country: String,
    /// ISO-3166-2 region/state code, only meaningful alongside `country == "USA"`.
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Device {
    pub ua: String,
    pub ip: String,
    pub ipv6: String,
    pub geo: Option<Geo>,
    pub devicetype: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Site {
    pub id: String,
    pub domain: String,
    pub page: String,
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct App {
    pub id: String,
    pub bundle: String,
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Publisher {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DistributionChannel {
    Site(Site),
    App(App),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct User {
    pub id: String,
    /// Base64url TCF v2 consent string (GDPR) or, legacy usage aside, the
    /// generic consent carrier field.
    pub consent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Regs {
    /// 1 if GDPR applies, otherwise unset/0.
    pub gdpr: Option<i32>,
    /// 1 if COPPA applies.
    pub coppa: Option<i32>,
    /// CCPA-era US Privacy string, format `1NOS`.
    pub us_privacy: String,
    /// Global Privacy Platform string, tilde-separated sections.
    pub gpp: String,
    pub gpp_sid: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Source {
    pub tid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BidRequest {
    pub id: String,
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    pub device: Option<Device>,
    pub user: Option<User>,
    pub regs: Option<Regs>,
    pub source: Option<Source>,
    pub tmax: i64,
    pub test: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl BidRequest {
    pub fn distribution_channel(&self) -> Option<DistributionChannel> {
        if let Some(site) = &self.site {
            Some(DistributionChannel::Site(site.clone()))
        } else {
            self.app.clone().map(DistributionChannel::App)
        }
    }

    pub fn publisher_id(&self) -> Option<String> {
        match self.distribution_channel()? {
            DistributionChannel::Site(site) => site.publisher.map(|p| p.id),
            DistributionChannel::App(app) => app.publisher.map(|p| p.id),
        }
    }

    pub fn domain(&self) -> String {
        match self.distribution_channel() {
            Some(DistributionChannel::Site(site)) => site.domain,
            Some(DistributionChannel::App(app)) => app.bundle,
            None => String::new(),
        }
    }

    pub fn stored_request_id(&self) -> Option<&str> {
        self.ext
            .as_ref()?
            .pointer("/prebid/storedrequest/id")?
            .as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imp_media_type_picks_the_single_set_variant() {
        let imp = Imp {
            banner: Some(Banner { w: Some(300), h: Some(250) }),
            ..Default::default()
        };
        assert_eq!(imp.media_type(), Some(MediaType::Banner));
    }

    #[test]
    fn targeted_bidders_reads_ext_prebid_bidder_keys() {
        let imp: Imp = serde_json::from_value(serde_json::json!({
            "id": "imp-1",
            "banner": {"w": 300, "h": 250},
            "ext": {"prebid": {"bidder": {"acme": {"placementId": "123"}, "other": {}}}}
        }))
        .unwrap();

        let mut bidders = imp.targeted_bidders();
        bidders.sort();
        assert_eq!(bidders, vec!["acme".to_string(), "other".to_string()]);
    }
}
