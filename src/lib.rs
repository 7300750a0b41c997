//! # VFR (Video Frame Reassembly)
//!
//! UDP로 쪼개져 들어오는 비디오 엘리멘터리 스트림을 프레임 단위로 재조립
//!
//! ## 핵심 특징
//! - **무순서 조립**: 청크가 순서 없이, 중복으로 와도 프레임을 정확히 복원
//! - **손실 집계**: frame_id 간격으로 드롭 프레임 수 추적
//! - **타임아웃 정리**: 오래된 미완성 프레임은 매 폴링마다 제거
//! - **논블로킹**: 단일 스레드 폴링 루프, 누락 데이터를 기다리지 않음
//! - **방어적 파싱**: 잘못된 데이터그램은 상태 변경 없이 폐기

pub mod chunk;
pub mod config;
pub mod decoder;
pub mod error;
pub mod eviction;
pub mod extradata;
pub mod frame_table;
pub mod packet;
pub mod reassembler;
pub mod receiver;
pub mod sender;
pub mod sequence;
pub mod stats;
pub mod transport;

pub use chunk::{ChunkAccumulator, FrameChunker};
pub use config::Config;
pub use decoder::{ChannelRenderer, Decoder, NullRenderer, PassthroughDecoder, Picture, Renderer, StreamWriter};
pub use error::{Error, Result};
pub use eviction::EvictionSweeper;
pub use extradata::ExtradataAssembler;
pub use frame_table::{Apply, CompletedFrame, FrameTable};
pub use packet::{ChunkHeader, PacketType, PacketView};
pub use reassembler::{Ingest, Reassembler};
pub use receiver::{Receiver, ReceiverHandle};
pub use sender::{FrameSender, ImpairmentOptions, SenderStats};
pub use sequence::SequenceTracker;
pub use stats::{StatsAggregator, StatsReport};
pub use transport::{Transport, UdpTransport};

/// 프레임 식별자 (스트림 내 단조 증가)
pub type FrameId = u32;

/// 청크 헤더 크기 (바이트)
pub const HEADER_SIZE: usize = 9;

/// 기본 청크 페이로드 최대 크기 (바이트, 송신측과 합의된 값)
pub const DEFAULT_CHUNK_PAYLOAD: usize = 1400;

/// 기본 미완성 프레임 타임아웃 (밀리초)
pub const DEFAULT_EVICTION_TIMEOUT_MS: u64 = 500;

/// 기본 수신 포트
pub const DEFAULT_PORT: u16 = 5000;
