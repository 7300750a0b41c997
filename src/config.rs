//! 수신기 설정

use std::time::Duration;

use crate::{DEFAULT_CHUNK_PAYLOAD, DEFAULT_EVICTION_TIMEOUT_MS};

/// VFR 수신기 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크 페이로드 최대 크기 (바이트)
    /// 송신측과 반드시 같은 값이어야 함
    pub chunk_payload_size: usize,

    /// 미완성 프레임 타임아웃 (밀리초)
    pub eviction_timeout_ms: u64,

    /// 동시에 조립 중일 수 있는 최대 프레임 수
    pub max_pending_frames: usize,

    /// 조립 버퍼 전체 상한 (바이트)
    pub max_buffered_bytes: usize,

    /// 수신이 없을 때 루프 대기 시간 (밀리초)
    pub idle_sleep_ms: u64,

    /// 통계 보고 주기 (밀리초)
    pub stats_interval_ms: u64,

    /// 수신 버퍼 크기 (데이터그램 하나)
    pub recv_buffer_size: usize,

    /// 디코더 핸드오프 채널 크기
    pub decode_queue_size: usize,

    /// 시작 시 기대 frame_id
    pub initial_frame_id: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_payload_size: DEFAULT_CHUNK_PAYLOAD,
            eviction_timeout_ms: DEFAULT_EVICTION_TIMEOUT_MS,
            max_pending_frames: 64,
            max_buffered_bytes: 256 * 1024 * 1024, // 256MB
            idle_sleep_ms: 1,
            stats_interval_ms: 1000,
            recv_buffer_size: 65535,
            decode_queue_size: 32,
            initial_frame_id: 0,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eviction_timeout(&self) -> Duration {
        Duration::from_millis(self.eviction_timeout_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    /// 저사양 기기용 설정
    pub fn low_spec() -> Self {
        Self {
            max_pending_frames: 16,
            max_buffered_bytes: 32 * 1024 * 1024, // 32MB
            idle_sleep_ms: 2,
            decode_queue_size: 8,
            ..Self::default()
        }
    }

    /// 고해상도/고프레임 스트림용 설정
    pub fn high_throughput() -> Self {
        Self {
            max_pending_frames: 256,
            max_buffered_bytes: 1024 * 1024 * 1024, // 1GB
            idle_sleep_ms: 0,
            decode_queue_size: 128,
            ..Self::default()
        }
    }
}
