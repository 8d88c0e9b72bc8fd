//! Lab 3: FIFO message groups.
//!
//! A producer publishes to an SNS FIFO topic that fans out into an SQS FIFO
//! queue; a pool of consumers competes for the queue, either taking any group
//! or sticking to one group and releasing everything else.

pub mod consumer;
pub mod dispatch;
pub mod envelope;
pub mod pool;
pub mod producer;
pub mod settings;
pub mod stats;
