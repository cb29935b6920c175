//! 捕获日志的 logger
//!
//! 进程内只能安装一个 logger，[`init`] 可重复调用。测试并行运行在不同线程上，
//! 记录按线程归属，[`take`] 只返回当前线程产生的记录。

use std::sync::{Mutex, Once};
use std::thread::{self, ThreadId};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// 一条捕获到的日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

struct CaptureLogger;

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();
static RECORDS: Mutex<Vec<(ThreadId, CapturedRecord)>> = Mutex::new(Vec::new());

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let captured = CapturedRecord {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        RECORDS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((thread::current().id(), captured));
    }

    fn flush(&self) {}
}

/// 安装捕获 logger，最大级别为 `Trace`
pub fn init() {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// 取出当前线程的全部记录
pub fn take() -> Vec<CapturedRecord> {
    let me = thread::current().id();
    let mut records = RECORDS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let (mine, others): (Vec<_>, Vec<_>) = records.drain(..).partition(|(id, _)| *id == me);
    *records = others;
    mine.into_iter().map(|(_, record)| record).collect()
}

/// 当前线程是否有 `level` 级别且包含 `needle` 的记录（不消费记录）
pub fn contains(level: Level, needle: &str) -> bool {
    let me = thread::current().id();
    RECORDS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .any(|(id, record)| *id == me && record.level == level && record.message.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_per_thread() {
        init();
        log::warn!("from main test thread");
        thread::spawn(|| log::warn!("from another thread"))
            .join()
            .unwrap();

        assert!(contains(Level::Warn, "main test thread"));
        assert!(!contains(Level::Warn, "another thread"));
        let records = take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "from main test thread");
        assert!(take().is_empty());
    }
}
