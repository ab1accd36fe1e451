use crate::config::FeedConfig;
use std::fmt;

/// Command payload that switches a door or light on
pub const COMMAND_ON: &str = "ON";
/// Command payload that switches a door or light off
pub const COMMAND_OFF: &str = "OFF";

/// Named broker channels used by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Status,
    Door,
    Light,
    Led,
    Image,
    Button,
}

impl Feed {
    pub const ALL: [Feed; 6] = [
        Feed::Status,
        Feed::Door,
        Feed::Light,
        Feed::Led,
        Feed::Image,
        Feed::Button,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feed::Status => "status",
            Feed::Door => "door",
            Feed::Light => "light",
            Feed::Led => "led",
            Feed::Image => "image",
            Feed::Button => "button",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps feeds to broker topics of the form `{username}/feeds/{key}`
#[derive(Debug, Clone)]
pub struct FeedSet {
    username: String,
    keys: FeedConfig,
}

impl FeedSet {
    pub fn new(username: impl Into<String>, keys: FeedConfig) -> Self {
        Self {
            username: username.into(),
            keys,
        }
    }

    pub fn key(&self, feed: Feed) -> &str {
        match feed {
            Feed::Status => &self.keys.status,
            Feed::Door => &self.keys.door,
            Feed::Light => &self.keys.light,
            Feed::Led => &self.keys.led,
            Feed::Image => &self.keys.image,
            Feed::Button => &self.keys.button,
        }
    }

    pub fn topic(&self, feed: Feed) -> String {
        format!("{}/feeds/{}", self.username, self.key(feed))
    }

    /// Resolve an inbound topic; the short `{username}/f/{key}` form is accepted too
    pub fn resolve(&self, topic: &str) -> Option<Feed> {
        let rest = topic.strip_prefix(self.username.as_str())?;
        let key = rest
            .strip_prefix("/feeds/")
            .or_else(|| rest.strip_prefix("/f/"))?;

        Feed::ALL.into_iter().find(|feed| self.key(*feed) == key)
    }
}
