//! Turns the per-frame color into pin writes, once per change.
//!
//! Dispatchers own the activation state and mutate it on the sampling thread
//! only, before handing a command to a [`CommandSink`]. Sinks deliver in the
//! background, so `apply` never waits on the network.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::color::{Channel, Color};

/// A single pin write. Moved by value into whatever delivers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub address: String,
    pub value: i32,
}

impl OutboundCommand {
    pub fn new(address: impl Into<String>, value: i32) -> Self {
        OutboundCommand {
            address: address.into(),
            value,
        }
    }
}

/// Fire-and-forget delivery of commands. None of these may block on the
/// network, except [`CommandSink::send_blocking`].
pub trait CommandSink {
    /// Hands the command off for immediate delivery.
    fn send(&self, command: OutboundCommand);

    /// Hands the command off for delivery once `delay` has passed.
    fn send_after(&self, command: OutboundCommand, delay: Duration);

    /// Delivers before returning. Only used once the sampling loop is over.
    fn send_blocking(&self, command: OutboundCommand) {
        self.send(command)
    }
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn send(&self, command: OutboundCommand) {
        (**self).send(command)
    }

    fn send_after(&self, command: OutboundCommand, delay: Duration) {
        (**self).send_after(command, delay)
    }

    fn send_blocking(&self, command: OutboundCommand) {
        (**self).send_blocking(command)
    }
}

pub trait Dispatcher {
    /// Applies the classification of the newest frame, observed at `now`.
    fn apply(&mut self, color: Color, now: Instant);

    /// Exit behavior, run once after the last frame.
    fn shutdown(&mut self);
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn apply(&mut self, color: Color, now: Instant) {
        (**self).apply(color, now)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoBitAddresses {
    pub pin1: String,
    pub pin2: String,
}

impl Default for TwoBitAddresses {
    fn default() -> Self {
        TwoBitAddresses {
            pin1: "%QX0.4".to_string(),
            pin2: "%QX0.6".to_string(),
        }
    }
}

/// Encodes the latest color as two bits over two pins.
pub struct TwoBitDispatcher<S> {
    sink: S,
    addresses: TwoBitAddresses,
    last: Color,
}

impl<S: CommandSink> TwoBitDispatcher<S> {
    pub fn new(sink: S, addresses: TwoBitAddresses) -> Self {
        TwoBitDispatcher {
            sink,
            addresses,
            last: Color::None,
        }
    }

    pub fn encode(color: Color) -> (i32, i32) {
        match color {
            Color::None => (0, 0),
            Color::Red => (1, 0),
            Color::Green => (0, 1),
            Color::Blue => (1, 1),
        }
    }

    pub fn last(&self) -> Color {
        self.last
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: CommandSink> Dispatcher for TwoBitDispatcher<S> {
    fn apply(&mut self, color: Color, _now: Instant) {
        if color == self.last {
            return;
        }

        let (pin1, pin2) = Self::encode(color);
        info!("{} -> {}, writing ({}, {})", self.last, color, pin1, pin2);
        self.last = color;

        self.sink
            .send(OutboundCommand::new(self.addresses.pin1.as_str(), pin1));
        self.sink
            .send(OutboundCommand::new(self.addresses.pin2.as_str(), pin2));
    }

    fn shutdown(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelAddresses {
    pub red: String,
    pub green: String,
    pub blue: String,
}

impl ChannelAddresses {
    pub fn get(&self, channel: Channel) -> &str {
        match channel {
            Channel::Red => &self.red,
            Channel::Green => &self.green,
            Channel::Blue => &self.blue,
        }
    }
}

impl Default for ChannelAddresses {
    fn default() -> Self {
        ChannelAddresses {
            red: "%QX0.0".to_string(),
            green: "%QX0.1".to_string(),
            blue: "%QX0.2".to_string(),
        }
    }
}

pub const DEFAULT_DEACTIVATE_DELAY: Duration = Duration::from_secs(5);

/// One pin per channel. The designated channel is switched off by a timer
/// only; every other channel follows the classification.
pub struct PerChannelDispatcher<S> {
    sink: S,
    addresses: ChannelAddresses,
    designated: Channel,
    delay: Duration,
    active: [bool; 3],
    last_activation: Option<Instant>,
    /// Deadline of the pending deactivation, measured from the `now` passed
    /// to `apply`. The timer thread starts a little later, so an activation
    /// right at the deadline may still be followed by the old timer's `0`.
    timer_deadline: Option<Instant>,
}

impl<S: CommandSink> PerChannelDispatcher<S> {
    pub fn new(sink: S, addresses: ChannelAddresses, delay: Duration) -> Self {
        PerChannelDispatcher {
            sink,
            addresses,
            designated: Channel::Red,
            delay,
            active: [false; 3],
            last_activation: None,
            timer_deadline: None,
        }
    }

    pub fn is_active(&self, channel: Channel) -> bool {
        self.active[channel.index()]
    }

    pub fn timer_pending(&self) -> bool {
        self.timer_deadline.is_some()
    }

    pub fn last_activation(&self) -> Option<Instant> {
        self.last_activation
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn command(&self, channel: Channel, value: i32) -> OutboundCommand {
        OutboundCommand::new(self.addresses.get(channel), value)
    }

    fn poll_timer(&mut self, now: Instant) {
        if let Some(deadline) = self.timer_deadline {
            if now >= deadline {
                debug!("Deactivation timer for {} has fired", self.designated);
                self.timer_deadline = None;
            }
        }
    }

    fn activate_designated(&mut self, now: Instant) {
        let channel = self.designated;
        info!("{} activated", channel);
        self.last_activation = Some(now);
        self.sink.send(self.command(channel, 1));

        if self.timer_deadline.is_none() {
            debug!("{} will be deactivated in {:?}", channel, self.delay);
            self.timer_deadline = Some(now + self.delay);
            self.sink.send_after(self.command(channel, 0), self.delay);
        }
    }
}

impl<S: CommandSink> Dispatcher for PerChannelDispatcher<S> {
    fn apply(&mut self, color: Color, now: Instant) {
        self.poll_timer(now);

        for channel in Channel::ALL.iter().copied() {
            let detected = color.channel() == Some(channel);

            if self.active[channel.index()] == detected {
                continue;
            }
            self.active[channel.index()] = detected;

            if channel == self.designated {
                // Losing the designated color only re-arms edge detection;
                // its pin is left to the timer.
                if detected {
                    self.activate_designated(now);
                }
            } else {
                info!(
                    "{} {}",
                    channel,
                    if detected { "activated" } else { "deactivated" }
                );
                self.sink.send(self.command(channel, detected as i32));
            }
        }
    }

    fn shutdown(&mut self) {
        info!("Deactivating all channels");

        for channel in Channel::ALL.iter().copied() {
            self.active[channel.index()] = false;
            self.sink.send_blocking(self.command(channel, 0));
        }
    }
}
