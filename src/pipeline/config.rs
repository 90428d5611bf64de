//! Pipeline configuration

use crate::event::Channel;
use crate::stage::StageConfig;

/// Pipeline configuration options
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Socket stage settings
    pub socket: StageConfig,

    /// Effect stage settings
    pub effect: StageConfig,

    /// DOM-effect stage settings
    pub dom: StageConfig,

    /// Log stage settings
    pub log: StageConfig,
}

impl PipelineConfig {
    /// Use the same settings for every stage
    pub fn with_stage_config(config: StageConfig) -> Self {
        Self {
            socket: config.clone(),
            effect: config.clone(),
            dom: config.clone(),
            log: config,
        }
    }

    /// Settings for one stage
    pub fn stage(&self, channel: Channel) -> &StageConfig {
        match channel {
            Channel::Socket => &self.socket,
            Channel::Effect => &self.effect,
            Channel::DomEffect => &self.dom,
            Channel::Log => &self.log,
        }
    }

    /// Replace one stage's settings
    pub fn stage_config(mut self, channel: Channel, config: StageConfig) -> Self {
        match channel {
            Channel::Socket => self.socket = config,
            Channel::Effect => self.effect = config,
            Channel::DomEffect => self.dom = config,
            Channel::Log => self.log = config,
        }
        self
    }
}
