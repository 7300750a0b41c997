//! 수신 통계

use std::time::{Duration, Instant};

/// 주기 보고 (FPS, 처리율, 누적 드롭)
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    /// 보고 구간 길이
    pub window: Duration,

    /// 구간 내 표시 프레임 수 / 초
    pub fps: f64,

    /// 구간 내 수신 바이트 / 초
    pub throughput: f64,

    /// 시작 이후 누적 드롭 프레임 수
    pub dropped_frames: u64,

    /// 시작 이후 타임아웃으로 제거된 프레임 수
    pub evicted_frames: u64,
}

impl StatsReport {
    /// 한 줄 요약
    pub fn summary(&self) -> String {
        format!(
            "[FPS: {}] [Drops since start: {}] [Evicted: {}] [{:.2} MB/s]",
            self.fps as u64,
            self.dropped_frames,
            self.evicted_frames,
            self.throughput / 1_000_000.0,
        )
    }
}

/// 수신 통계 집계
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    /// 시작 시간
    pub start_time: Instant,

    /// 수신 데이터그램 수
    pub datagrams: u64,

    /// 수신 바이트 (헤더 포함)
    pub total_bytes: u64,

    /// 잘못된 패킷 수
    pub malformed: u64,

    /// 알 수 없는 타입 패킷 수
    pub unknown_type: u64,

    /// 한도/할당 실패로 거부된 청크 수
    pub rejected: u64,

    /// 중복 수신 청크 수
    pub duplicate_chunks: u64,

    /// 조립 완료 프레임 수
    pub frames_completed: u64,

    /// 타임아웃으로 제거된 프레임 수
    pub frames_evicted: u64,

    /// 표시된 프레임 수
    pub frames_rendered: u64,

    /// extradata 갱신 횟수
    pub extradata_updates: u64,

    /// 디코더/렌더러 실패 수
    pub decode_failures: u64,

    /// 순서 추적기의 누적 드롭 수 (복사본)
    pub dropped_frames: u64,

    /// 보고 주기
    interval: Duration,

    /// 현재 보고 구간 시작
    window_start: Instant,
    window_frames: u64,
    window_bytes: u64,
}

impl StatsAggregator {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            start_time: now,
            datagrams: 0,
            total_bytes: 0,
            malformed: 0,
            unknown_type: 0,
            rejected: 0,
            duplicate_chunks: 0,
            frames_completed: 0,
            frames_evicted: 0,
            frames_rendered: 0,
            extradata_updates: 0,
            decode_failures: 0,
            dropped_frames: 0,
            interval,
            window_start: now,
            window_frames: 0,
            window_bytes: 0,
        }
    }

    /// 데이터그램 수신 기록
    pub fn record_datagram(&mut self, size: usize) {
        self.datagrams += 1;
        self.total_bytes += size as u64;
        self.window_bytes += size as u64;
    }

    /// 프레임 표시 기록
    pub fn record_rendered(&mut self) {
        self.frames_rendered += 1;
        self.window_frames += 1;
    }

    /// 보고 주기가 지났으면 보고서 생성 후 구간 초기화
    pub fn poll_report(&mut self, now: Instant) -> Option<StatsReport> {
        let window = now.saturating_duration_since(self.window_start);
        if window < self.interval || window.is_zero() {
            return None;
        }

        let secs = window.as_secs_f64();
        let report = StatsReport {
            window,
            fps: self.window_frames as f64 / secs,
            throughput: self.window_bytes as f64 / secs,
            dropped_frames: self.dropped_frames,
            evicted_frames: self.frames_evicted,
        };

        self.window_start = now;
        self.window_frames = 0;
        self.window_bytes = 0;
        Some(report)
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전체 처리율 (bytes/sec)
    pub fn overall_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 프레임 손실률 (드롭 / (드롭 + 완료))
    ///
    /// 타임아웃 제거는 드롭에 포함되지 않으므로 실제보다 낮게 나올 수 있다.
    pub fn frame_loss_rate(&self) -> f64 {
        let total = self.dropped_frames + self.frames_completed;
        if total == 0 {
            return 0.0;
        }
        self.dropped_frames as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Frames: {} done / {} shown | Drops: {} | Evicted: {} | Dups: {} | Bad: {} | Throughput: {:.2} MB/s",
            self.elapsed().as_secs_f64(),
            self.frames_completed,
            self.frames_rendered,
            self.dropped_frames,
            self.frames_evicted,
            self.duplicate_chunks,
            self.malformed + self.unknown_type,
            self.overall_throughput() / 1_000_000.0,
        )
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_waits_for_interval() {
        let start = Instant::now();
        let mut stats = StatsAggregator::starting_at(Duration::from_secs(1), start);

        stats.record_datagram(1000);
        stats.record_rendered();
        assert!(stats.poll_report(start + Duration::from_millis(999)).is_none());

        for _ in 0..29 {
            stats.record_rendered();
        }
        stats.dropped_frames = 3;

        let report = stats.poll_report(start + Duration::from_secs(1)).unwrap();
        assert_eq!(report.fps, 30.0);
        assert_eq!(report.throughput, 1000.0);
        assert_eq!(report.dropped_frames, 3);
        assert!(report.summary().contains("[FPS: 30]"));
    }

    #[test]
    fn test_report_resets_window_not_totals() {
        let start = Instant::now();
        let mut stats = StatsAggregator::starting_at(Duration::from_millis(100), start);

        stats.record_rendered();
        stats.poll_report(start + Duration::from_millis(100)).unwrap();

        let report = stats.poll_report(start + Duration::from_millis(200)).unwrap();
        assert_eq!(report.fps, 0.0);
        assert_eq!(stats.frames_rendered, 1);
    }

    #[test]
    fn test_frame_loss_rate() {
        let mut stats = StatsAggregator::default();
        assert_eq!(stats.frame_loss_rate(), 0.0);

        stats.frames_completed = 3;
        stats.dropped_frames = 1;
        assert_eq!(stats.frame_loss_rate(), 0.25);
    }
}
