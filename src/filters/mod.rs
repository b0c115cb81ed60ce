pub mod butterworth;

pub use butterworth::{
    ButterworthBank, ButterworthBankBuilder, ButterworthError, ButterworthStage,
};
