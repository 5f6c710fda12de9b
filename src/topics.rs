//! Topic layout of a panel on the broker
//!
//! Every topic lives under `<base_topic>/<device_name>/`. Commands addressed to the
//! panel arrive under the `cmd/` sub-prefix.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of physical buttons on the panel
pub const NUM_BUTTONS: u8 = 6;

/// Payload published on a button topic
pub const PRESS_PAYLOAD: &str = "PRESS";

/// Press gesture reported for a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonAction {
    #[default]
    Single,
    Double,
    Triple,
    Quad,
}

impl ButtonAction {
    fn suffix(self) -> &'static str {
        match self {
            ButtonAction::Single => "",
            ButtonAction::Double => "_double",
            ButtonAction::Triple => "_triple",
            ButtonAction::Quad => "_quad",
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonAction::Single => "single",
            ButtonAction::Double => "double",
            ButtonAction::Triple => "triple",
            ButtonAction::Quad => "quad",
        };
        f.write_str(name)
    }
}

impl FromStr for ButtonAction {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ButtonAction::Single),
            "double" => Ok(ButtonAction::Double),
            "triple" => Ok(ButtonAction::Triple),
            "quad" => Ok(ButtonAction::Quad),
            other => Err(TopicError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("Button {0} out of range 1..={NUM_BUTTONS}")]
    ButtonOutOfRange(u8),
    #[error("Unknown button action: {0}")]
    UnknownAction(String),
}

/// Builds the topics of one panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    common: String,
}

impl TopicBuilder {
    pub fn new(base_topic: &str, device_name: &str) -> Self {
        Self {
            common: format!("{base_topic}/{device_name}/"),
        }
    }

    /// `<base>/<device>/`
    pub fn common_prefix(&self) -> &str {
        &self.common
    }

    /// `<base>/<device>/cmd/`
    pub fn cmd_prefix(&self) -> String {
        format!("{}cmd/", self.common)
    }

    /// Wildcard filter for every command topic
    pub fn cmd_filter(&self) -> String {
        format!("{}cmd/#", self.common)
    }

    /// `<base>/<device>/button_<n>[_double|_triple|_quad]`
    pub fn button(&self, button: u8, action: ButtonAction) -> Result<String, TopicError> {
        check_button(button)?;
        Ok(format!("{}button_{button}{}", self.common, action.suffix()))
    }

    pub fn temperature(&self) -> String {
        self.state("temperature")
    }

    pub fn humidity(&self) -> String {
        self.state("humidity")
    }

    pub fn battery(&self) -> String {
        self.state("battery")
    }

    pub fn sensor_interval(&self) -> String {
        self.state("sensor_interval")
    }

    pub fn sensor_interval_cmd(&self) -> String {
        self.cmd("sensor_interval")
    }

    pub fn button_label(&self, button: u8) -> Result<String, TopicError> {
        check_button(button)?;
        Ok(self.state(&format!("btn_{button}_label")))
    }

    pub fn button_label_cmd(&self, button: u8) -> Result<String, TopicError> {
        check_button(button)?;
        Ok(self.cmd(&format!("btn_{button}_label")))
    }

    pub fn awake_mode(&self) -> String {
        self.state("awake_mode")
    }

    pub fn awake_mode_cmd(&self) -> String {
        self.cmd("awake_mode")
    }

    pub fn awake_mode_available(&self) -> String {
        self.state("awake_mode/available")
    }

    /// Strip the command prefix, returning the command name
    pub fn command_name<'t>(&self, topic: &'t str) -> Option<&'t str> {
        topic
            .strip_prefix(self.common.as_str())
            .and_then(|rest| rest.strip_prefix("cmd/"))
            .filter(|name| !name.is_empty())
    }

    fn state(&self, leaf: &str) -> String {
        format!("{}{leaf}", self.common)
    }

    fn cmd(&self, leaf: &str) -> String {
        format!("{}cmd/{leaf}", self.common)
    }
}

fn check_button(button: u8) -> Result<(), TopicError> {
    if (1..=NUM_BUTTONS).contains(&button) {
        Ok(())
    } else {
        Err(TopicError::ButtonOutOfRange(button))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TopicBuilder {
        TopicBuilder::new("homebuttons", "Hallway")
    }

    #[test]
    fn test_prefixes() {
        let topics = builder();
        assert_eq!(topics.common_prefix(), "homebuttons/Hallway/");
        assert_eq!(topics.cmd_prefix(), "homebuttons/Hallway/cmd/");
        assert_eq!(topics.cmd_filter(), "homebuttons/Hallway/cmd/#");
    }

    #[test]
    fn test_button_topics() {
        let topics = builder();
        assert_eq!(
            topics.button(1, ButtonAction::Single).unwrap(),
            "homebuttons/Hallway/button_1"
        );
        assert_eq!(
            topics.button(3, ButtonAction::Double).unwrap(),
            "homebuttons/Hallway/button_3_double"
        );
        assert_eq!(
            topics.button(6, ButtonAction::Quad).unwrap(),
            "homebuttons/Hallway/button_6_quad"
        );
    }

    #[test]
    fn test_button_out_of_range() {
        let topics = builder();
        assert_eq!(
            topics.button(0, ButtonAction::Single),
            Err(TopicError::ButtonOutOfRange(0))
        );
        assert_eq!(
            topics.button_label(7),
            Err(TopicError::ButtonOutOfRange(7))
        );
    }

    #[test]
    fn test_sensor_and_mode_topics() {
        let topics = builder();
        assert_eq!(topics.temperature(), "homebuttons/Hallway/temperature");
        assert_eq!(topics.humidity(), "homebuttons/Hallway/humidity");
        assert_eq!(topics.battery(), "homebuttons/Hallway/battery");
        assert_eq!(topics.sensor_interval(), "homebuttons/Hallway/sensor_interval");
        assert_eq!(
            topics.sensor_interval_cmd(),
            "homebuttons/Hallway/cmd/sensor_interval"
        );
        assert_eq!(
            topics.button_label(2).unwrap(),
            "homebuttons/Hallway/btn_2_label"
        );
        assert_eq!(
            topics.button_label_cmd(2).unwrap(),
            "homebuttons/Hallway/cmd/btn_2_label"
        );
        assert_eq!(topics.awake_mode(), "homebuttons/Hallway/awake_mode");
        assert_eq!(topics.awake_mode_cmd(), "homebuttons/Hallway/cmd/awake_mode");
        assert_eq!(
            topics.awake_mode_available(),
            "homebuttons/Hallway/awake_mode/available"
        );
    }

    #[test]
    fn test_command_name() {
        let topics = builder();
        assert_eq!(
            topics.command_name("homebuttons/Hallway/cmd/awake_mode"),
            Some("awake_mode")
        );
        assert_eq!(topics.command_name("homebuttons/Hallway/cmd/"), None);
        assert_eq!(topics.command_name("homebuttons/Kitchen/cmd/awake_mode"), None);
        assert_eq!(topics.command_name("homebuttons/Hallway/battery"), None);
    }

    #[test]
    fn test_button_action_parse() {
        assert_eq!("double".parse::<ButtonAction>(), Ok(ButtonAction::Double));
        assert_eq!("QUAD".parse::<ButtonAction>(), Ok(ButtonAction::Quad));
        assert!("long".parse::<ButtonAction>().is_err());
        assert_eq!(ButtonAction::Triple.to_string(), "triple");
    }
}
