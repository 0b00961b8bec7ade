pub mod change_count;
pub mod key_log;

pub mod ids {
    use crate::BUS_ID;

    pub const CHANGE_COUNT: &str = const_format::concatcp!(BUS_ID, ".change-count");
    pub const KEY_LOG: &str = const_format::concatcp!(BUS_ID, ".key-log");
}
