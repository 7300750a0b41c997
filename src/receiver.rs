//! 수신 루프
//!
//! - 단일 스레드 협력형 폴링 (수신, 정리, 통계를 한 루프에서 교대로 처리)
//! - 누락 데이터를 기다리지 않음
//! - 종료 플래그를 매 반복마다 확인

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::decoder::{Decoder, Renderer};
use crate::frame_table::CompletedFrame;
use crate::reassembler::{Ingest, Reassembler};
use crate::stats::StatsAggregator;
use crate::transport::Transport;
use crate::{Config, Error, Result};

/// 수신기 핸들 (외부에서 제어용)
#[derive(Clone)]
pub struct ReceiverHandle {
    running: Arc<AtomicBool>,
    stats: Arc<RwLock<StatsAggregator>>,
}

impl ReceiverHandle {
    /// 정지 요청 (다음 반복에서 루프 종료)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 마지막 보고 시점의 통계
    pub fn stats(&self) -> StatsAggregator {
        self.stats.read().clone()
    }
}

/// 수신기
pub struct Receiver<T, D, R> {
    transport: T,
    decoder: D,
    renderer: R,
    engine: Reassembler,
    buf: Vec<u8>,
    running: Arc<AtomicBool>,
    shared_stats: Arc<RwLock<StatsAggregator>>,
}

impl<T, D, R> Receiver<T, D, R>
where
    T: Transport,
    D: Decoder,
    R: Renderer<D::Image>,
{
    pub fn new(config: Config, transport: T, decoder: D, renderer: R) -> Self {
        let buf = vec![0u8; config.recv_buffer_size];
        let engine = Reassembler::new(config);
        let shared_stats = Arc::new(RwLock::new(engine.stats().clone()));

        Self {
            transport,
            decoder,
            renderer,
            engine,
            buf,
            running: Arc::new(AtomicBool::new(true)),
            shared_stats,
        }
    }

    pub fn handle(&self) -> ReceiverHandle {
        ReceiverHandle {
            running: self.running.clone(),
            stats: self.shared_stats.clone(),
        }
    }

    /// 루프 한 번 실행
    ///
    /// 데이터그램을 최대 하나 처리하고, 수신 여부와 관계없이 정리를 실행한다.
    /// 데이터그램을 처리했으면 `true`. 에러는 전송 계층 실패일 때만 반환한다.
    pub fn poll_once(&mut self, now: Instant) -> Result<bool> {
        let received = self.transport.receive(&mut self.buf)?;

        if let Some(len) = received {
            match self.engine.handle_datagram(&self.buf[..len], now) {
                Ok(Ingest::Pending) => {}
                Ok(Ingest::Extradata(blob)) => {
                    if let Err(e) = self.decoder.submit_extradata(blob) {
                        warn!("extradata 적용 실패: {}", e);
                        self.engine.on_decode_failure();
                    }
                }
                Ok(Ingest::Frame(frame)) => self.deliver(frame),
                Err(e) if e.is_per_datagram() => trace!("데이터그램 폐기: {}", e),
                Err(e) => warn!("데이터그램 처리 실패: {}", e),
            }
        }

        let evicted = self.engine.sweep(now);
        if evicted > 0 {
            debug!("미완성 프레임 {}개 제거", evicted);
        }

        if let Some(report) = self.engine.poll_report(now) {
            info!("{}", report.summary());
            self.publish_stats();
        }

        Ok(received.is_some())
    }

    fn deliver(&mut self, frame: CompletedFrame) {
        let frame_id = frame.frame_id;

        let images = match self.decoder.submit_frame(frame_id, frame.data) {
            Ok(images) => images,
            Err(e) => {
                warn!("프레임 {} 디코딩 실패: {}", frame_id, e);
                self.engine.on_decode_failure();
                return;
            }
        };

        for image in images {
            match self.renderer.present(image) {
                Ok(()) => self.engine.on_frame_rendered(frame_id),
                Err(e) => {
                    warn!("프레임 {} 표시 실패: {}", frame_id, e);
                    self.engine.on_decode_failure();
                }
            }
        }
    }

    /// 정지 요청까지 루프 실행
    ///
    /// 종료 시 조립 중이던 프레임은 그대로 버린다.
    pub async fn run(&mut self) -> Result<()> {
        let idle = self.engine.config().idle_sleep();

        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }

            match self.poll_once(Instant::now()) {
                Ok(true) => {}
                Ok(false) if idle.is_zero() => tokio::task::yield_now().await,
                Ok(false) => tokio::time::sleep(idle).await,
                Err(e) => break Err(e),
            }
        };

        self.running.store(false, Ordering::SeqCst);
        let dropped = self.engine.shutdown();
        if dropped > 0 {
            info!("수신 종료: 조립 중이던 프레임 {}개 폐기", dropped);
        }
        self.publish_stats();
        info!("{}", self.engine.stats().summary());

        if let Err(Error::Io(e)) = &result {
            warn!("전송 계층 에러로 종료: {}", e);
        }
        result
    }

    fn publish_stats(&self) {
        *self.shared_stats.write() = self.engine.stats().clone();
    }

    pub fn engine(&self) -> &Reassembler {
        &self.engine
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
