use slog::{o, Drain};

pub fn new_logger() -> slog::Logger {
    use slog::Logger;
    use slog_term::term_full;
    use std::sync::Mutex;
    Logger::root(Mutex::new(term_full()).fuse(), o!())
}
