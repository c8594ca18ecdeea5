use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical color channel of a frame, in pixel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// Also the classifier's priority order.
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    /// The two channels a winner has to beat.
    pub fn others(self) -> [Channel; 2] {
        match self {
            Channel::Red => [Channel::Green, Channel::Blue],
            Channel::Green => [Channel::Red, Channel::Blue],
            Channel::Blue => [Channel::Red, Channel::Green],
        }
    }
}

/// Result of classifying one frame. Exactly one per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Red,
    Green,
    Blue,
    None,
}

impl Color {
    pub fn channel(self) -> Option<Channel> {
        match self {
            Color::Red => Some(Channel::Red),
            Color::Green => Some(Channel::Green),
            Color::Blue => Some(Channel::Blue),
            Color::None => None,
        }
    }
}

impl From<Channel> for Color {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Red => Color::Red,
            Channel::Green => Color::Green,
            Channel::Blue => Color::Blue,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Color::from(*self), f)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Red => "RED",
            Color::Green => "GREEN",
            Color::Blue => "BLUE",
            Color::None => "NONE",
        };
        f.write_str(name)
    }
}
