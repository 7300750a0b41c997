//! 재조립 엔진
//!
//! 스트림 하나에 대한 모든 조립 상태(extradata, 프레임 테이블, 순서 추적,
//! 통계)를 소유한다. 전역 상태 없이 루프가 인스턴스를 소유하고 넘겨준다.

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info};

use crate::eviction::EvictionSweeper;
use crate::extradata::ExtradataAssembler;
use crate::frame_table::{Apply, CompletedFrame, FrameTable};
use crate::packet::{PacketType, PacketView};
use crate::sequence::SequenceTracker;
use crate::stats::{StatsAggregator, StatsReport};
use crate::{Config, Error, FrameId, Result};

/// 데이터그램 처리 결과
#[derive(Debug)]
pub enum Ingest {
    /// 조립 진행 중
    Pending,

    /// 프레임 조립 완료 (디코더로 전달)
    Frame(CompletedFrame),

    /// 새 extradata 완료 (디코더 설정 리셋)
    Extradata(Bytes),
}

/// 재조립 엔진
#[derive(Debug)]
pub struct Reassembler {
    config: Config,
    extradata: ExtradataAssembler,
    frames: FrameTable,
    sequence: SequenceTracker,
    sweeper: EvictionSweeper,
    stats: StatsAggregator,
    first_frame_seen: bool,
}

impl Reassembler {
    pub fn new(config: Config) -> Self {
        Self {
            extradata: ExtradataAssembler::new(config.chunk_payload_size),
            frames: FrameTable::from_config(&config),
            sequence: SequenceTracker::new(config.initial_frame_id),
            sweeper: EvictionSweeper::new(config.eviction_timeout()),
            stats: StatsAggregator::new(config.stats_interval()),
            first_frame_seen: false,
            config,
        }
    }

    /// 데이터그램 하나 처리
    ///
    /// 에러는 통계에 기록된 뒤 반환된다. 호출측은 해당 데이터그램만 버리고
    /// 계속 진행하면 된다.
    pub fn handle_datagram(&mut self, datagram: &[u8], now: Instant) -> Result<Ingest> {
        self.stats.record_datagram(datagram.len());

        let result = self.dispatch(datagram, now);
        if let Err(e) = &result {
            self.record_error(e);
        }
        result
    }

    fn dispatch(&mut self, datagram: &[u8], now: Instant) -> Result<Ingest> {
        let view = PacketView::parse(datagram)?;
        view.validate(self.config.chunk_payload_size)?;

        match view.packet_type() {
            PacketType::Extradata => self.apply_extradata(&view),
            PacketType::Frame => self.apply_frame(&view, now),
        }
    }

    fn apply_extradata(&mut self, view: &PacketView<'_>) -> Result<Ingest> {
        let completed = self
            .extradata
            .apply(view.chunk_index(), view.chunk_count(), view.payload)?;

        match completed {
            Some(blob) => {
                info!("Extradata received ({} bytes)", blob.len());
                self.stats.extradata_updates += 1;
                Ok(Ingest::Extradata(blob))
            }
            None => Ok(Ingest::Pending),
        }
    }

    fn apply_frame(&mut self, view: &PacketView<'_>, now: Instant) -> Result<Ingest> {
        if !self.first_frame_seen {
            info!("First frame chunk received! Reassembling...");
            self.first_frame_seen = true;
        }

        self.sequence.observe(view.frame_id());
        self.stats.dropped_frames = self.sequence.dropped_count();

        let applied = self.frames.apply(
            view.frame_id(),
            view.chunk_index(),
            view.chunk_count(),
            view.payload,
            now,
        )?;

        match applied {
            Apply::Pending { duplicate } => {
                if duplicate {
                    self.stats.duplicate_chunks += 1;
                }
                Ok(Ingest::Pending)
            }
            Apply::Complete(frame) => {
                debug!(
                    "프레임 {} 완료: {} bytes, {} chunks, {:.2}ms",
                    frame.frame_id,
                    frame.data.len(),
                    frame.chunk_count,
                    frame.assembly_time.as_secs_f64() * 1000.0
                );
                self.stats.frames_completed += 1;
                Ok(Ingest::Frame(frame))
            }
        }
    }

    fn record_error(&mut self, error: &Error) {
        match error {
            Error::MalformedPacket { .. } => self.stats.malformed += 1,
            Error::UnknownPacketType(_) => self.stats.unknown_type += 1,
            e if e.is_per_datagram() => self.stats.rejected += 1,
            _ => {}
        }
    }

    /// 오래된 프레임 정리 (매 폴링 주기마다 호출)
    pub fn sweep(&mut self, now: Instant) -> usize {
        let evicted = self.sweeper.sweep(&mut self.frames, now);
        self.stats.frames_evicted += evicted as u64;
        evicted
    }

    /// 프레임의 디코딩 결과가 표시된 뒤 호출
    pub fn on_frame_rendered(&mut self, frame_id: FrameId) {
        self.sequence.advance_on_render(frame_id);
        self.stats.record_rendered();
    }

    /// 디코더/렌더러 실패 기록
    pub fn on_decode_failure(&mut self) {
        self.stats.decode_failures += 1;
    }

    /// 주기 통계 보고
    pub fn poll_report(&mut self, now: Instant) -> Option<StatsReport> {
        self.stats.poll_report(now)
    }

    /// 조립 중인 프레임 모두 폐기, 폐기된 수 반환
    pub fn shutdown(&mut self) -> usize {
        let in_flight = self.frames.len();
        self.frames.clear();
        in_flight
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn current_extradata(&self) -> Option<&Bytes> {
        self.extradata.current()
    }
}
