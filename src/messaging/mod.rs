mod redpanda;

pub use redpanda::{message_for, RedpandaEventBus};
