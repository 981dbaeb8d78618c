use super::core::{RunSummary, Stage};
use super::packet::Packet;
use crate::error::{EtlError, EtlResult};
use chrono::Utc;
use std::fmt;
use std::time::Instant;

/// Lifecycle of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Stages linked, not yet initialised
    Assembled,
    /// `do_init` done; packets may be processed
    Initialized,
    /// `do_exit` done
    Exited,
}

impl ChainState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainState::Assembled => "Assembled",
            ChainState::Initialized => "Initialized",
            ChainState::Exited => "Exited",
        }
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, immutable sequence of linked stages
///
/// A packet enters at the head and moves towards the tail one stage at a
/// time. Dispatch is iterative, so chain length does not grow the call stack.
///
/// # Example
/// ```
/// use etl_chain::config::ConfigStore;
/// use etl_chain::error::EtlResult;
/// use etl_chain::pipeline::{Chain, FormatTag, Packet, Stage, StageCore};
///
/// struct Emit(StageCore);
///
/// impl Stage for Emit {
///     fn core(&self) -> &StageCore {
///         &self.0
///     }
///
///     fn invoke(&mut self, mut packet: Packet) -> EtlResult<Packet> {
///         packet.set_data("hello".into());
///         packet.set_end_of_stream();
///         Ok(packet)
///     }
/// }
///
/// let store = ConfigStore::new().with_section("emit", Vec::<(String, String)>::new());
/// let core = StageCore::new(&store, "emit", FormatTag::None, FormatTag::String).unwrap();
///
/// let mut chain = Chain::builder("hello").add_stage(Emit(core)).unwrap().build().unwrap();
/// let summary = chain.run().unwrap();
/// assert_eq!(summary.packets_processed, 1);
/// ```
pub struct Chain {
    name: String,
    stages: Vec<Box<dyn Stage>>,
    state: ChainState,
}

impl Chain {
    /// Create a new chain builder
    pub fn builder(name: impl Into<String>) -> ChainBuilder {
        ChainBuilder::new(name)
    }

    /// Get the chain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Descriptions of all stages, head first
    pub fn describe_stages(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.describe()).collect()
    }

    /// Check every adjacent pair of stages
    pub fn is_compatible(&self) -> bool {
        self.stages
            .windows(2)
            .all(|pair| pair[0].is_compatible_with(pair[1].as_ref()))
    }

    fn expect_state(&self, expected: ChainState, operation: &str) -> EtlResult<()> {
        if self.state != expected {
            return Err(EtlError::InvalidStateTransition(format!(
                "cannot {} chain '{}' in state {}",
                operation, self.name, self.state
            )));
        }
        Ok(())
    }

    /// Call `init` on every stage, head to tail
    pub fn do_init(&mut self) -> EtlResult<()> {
        self.expect_state(ChainState::Assembled, "init")?;
        tracing::info!(chain = %self.name, stages = self.stages.len(), "initializing chain");

        for stage in self.stages.iter_mut() {
            tracing::debug!(chain = %self.name, stage = stage.name(), "init");
            stage.init()?;
        }

        self.state = ChainState::Initialized;
        Ok(())
    }

    /// Call `exit` on every stage, head to tail
    pub fn do_exit(&mut self) -> EtlResult<()> {
        self.expect_state(ChainState::Initialized, "exit")?;
        tracing::info!(chain = %self.name, "exiting chain");

        for stage in self.stages.iter_mut() {
            tracing::debug!(chain = %self.name, stage = stage.name(), "exit");
            stage.exit()?;
        }

        self.state = ChainState::Exited;
        Ok(())
    }

    /// Push one packet through the chain
    ///
    /// A stage whose `before_invoke` or `after_invoke` returns false stops the
    /// packet there. Every stage whose `after_invoke` let the packet pass gets
    /// `after_chain_invoke`, tail first, once the packet has gone as far as it
    /// goes. Errors from a stage are returned unchanged.
    pub fn process(&mut self, packet: Packet) -> EtlResult<Packet> {
        self.expect_state(ChainState::Initialized, "process packets on")?;

        let mut packet = packet;
        let last = self.stages.len().saturating_sub(1);
        let mut passed = 0;

        for (index, stage) in self.stages.iter_mut().enumerate() {
            if !stage.before_invoke(&mut packet) {
                tracing::trace!(stage = stage.name(), "stopped before invoke");
                break;
            }

            packet = stage.invoke(packet)?;

            if !stage.after_invoke(&mut packet) {
                tracing::trace!(stage = stage.name(), "stopped after invoke");
                break;
            }
            passed += 1;

            if index < last {
                packet.set_format(stage.output_format());
            }
        }

        for stage in self.stages[..passed].iter_mut().rev() {
            if !stage.after_chain_invoke(&mut packet) {
                tracing::trace!(stage = stage.name(), "after chain invoke returned false");
            }
        }

        Ok(packet)
    }

    /// Run the chain to completion
    ///
    /// Initialises the chain, feeds fresh packets to the head until one comes
    /// back marked end-of-stream, then exits the chain.
    pub fn run(&mut self) -> EtlResult<RunSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut packets_processed = 0u64;

        self.do_init()?;
        loop {
            let packet = self.process(Packet::new())?;
            packets_processed += 1;
            if packet.is_end_of_stream() {
                break;
            }
        }
        self.do_exit()?;

        let total_duration = start.elapsed();
        tracing::info!(
            chain = %self.name,
            packets = packets_processed,
            "chain completed in {:.2}s",
            total_duration.as_secs_f64()
        );

        Ok(RunSummary::new(
            &self.name,
            started_at,
            packets_processed,
            total_duration,
        ))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("stages", &self.describe_stages())
            .field("state", &self.state)
            .finish()
    }
}

/// Builder for constructing chains
///
/// Each added stage is linked to the previous one and checked for format
/// compatibility on the spot.
pub struct ChainBuilder {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl ChainBuilder {
    /// Create a new chain builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Link a stage after the current tail
    pub fn add_stage<S: Stage + 'static>(self, stage: S) -> EtlResult<Self> {
        self.add_boxed_stage(Box::new(stage))
    }

    /// Link a boxed stage after the current tail
    pub fn add_boxed_stage(mut self, stage: Box<dyn Stage>) -> EtlResult<Self> {
        if let Some(tail) = self.stages.last() {
            if !tail.is_compatible_with(stage.as_ref()) {
                return Err(EtlError::Compatibility {
                    upstream: tail.describe(),
                    downstream: stage.describe(),
                });
            }
        }
        tracing::debug!(chain = %self.name, stage = %stage.describe(), "linked stage");
        self.stages.push(stage);
        Ok(self)
    }

    /// Build the chain
    pub fn build(self) -> EtlResult<Chain> {
        if self.stages.is_empty() {
            return Err(EtlError::configuration(
                &self.name,
                "a chain needs at least one stage",
            ));
        }
        tracing::info!(chain = %self.name, stages = self.stages.len(), "chain assembled");
        Ok(Chain {
            name: self.name,
            stages: self.stages,
            state: ChainState::Assembled,
        })
    }
}
