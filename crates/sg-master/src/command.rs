//! Commands submitted to a controller from another thread.

use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use sg_engine::PlayOptions;
use sg_ir::{name, Name};

/// Commands a `CommandSender` can hold before the controller drains them.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// One caller request, applied at the start of the next tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    PlayMusic { name: Name, options: PlayOptions },
    StopMusic { fade: f32 },
    PauseMusic { fade: f32 },
    ResumeMusic { fade: f32 },
    PlayStinger { name: Name },
    SetSwitch { group: Name, value: Name, fade: f32 },
    Mute { fade: f32 },
    Unmute { fade: f32 },
    CancelPending,
}

impl Command {
    pub fn play(asset: &str, options: PlayOptions) -> Self {
        Command::PlayMusic { name: name(asset), options }
    }

    pub fn stinger(stinger: &str) -> Self {
        Command::PlayStinger { name: name(stinger) }
    }

    pub fn switch(group: &str, value: &str, fade: f32) -> Self {
        Command::SetSwitch { group: name(group), value: name(value), fade }
    }
}

/// Producer end of a controller's command queue.
pub struct CommandSender {
    producer: HeapProd<Command>,
}

impl CommandSender {
    pub(crate) fn new(producer: HeapProd<Command>) -> Self {
        Self { producer }
    }

    /// Queue a command; hands it back when the queue is full.
    pub fn send(&mut self, command: Command) -> Result<(), Command> {
        self.producer.try_push(command)
    }
}
