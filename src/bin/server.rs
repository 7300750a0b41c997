//! VFR 서버 (송신자) - Video Frame Reassembly
//!
//! 파일을 고정 크기 프레임으로 나눠 청크 단위로 UDP 전송
//! - 일정 FPS로 페이싱
//! - 손실/중복/순서 뒤섞기 흉내 (수신측 검증용)
//!
//! 사용법:
//!   cargo run --release --bin vfr-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 전송
//!   cargo run --release --bin vfr-server -- --target 127.0.0.1:5000 --file stream.obu
//!
//!   # 5% 손실 + 순서 뒤섞기
//!   cargo run --release --bin vfr-server -- -f stream.obu --loss 0.05 --shuffle

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vfr::sender::{FrameSender, ImpairmentOptions};
use vfr::DEFAULT_CHUNK_PAYLOAD;

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    target: SocketAddr,
    file_path: Option<PathBuf>,
    extradata_path: Option<PathBuf>,
    frame_size: usize,
    chunk_size: usize,
    fps: u32,
    repeat: bool,
    impairment: ImpairmentOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            target: SocketAddr::from(([127, 0, 0, 1], vfr::DEFAULT_PORT)),
            file_path: None,
            extradata_path: None,
            frame_size: 64 * 1024,
            chunk_size: DEFAULT_CHUNK_PAYLOAD,
            fps: 60,
            repeat: false,
            impairment: ImpairmentOptions::default(),
        }
    }
}

fn parse_args() -> Result<ServerConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = parse_value(value, "주소")?;
                i += 1;
            }
            "--target" | "-t" => {
                config.target = parse_value(value, "주소")?;
                i += 1;
            }
            "--file" | "-f" => {
                config.file_path = Some(PathBuf::from(value.ok_or("경로 필요")?));
                i += 1;
            }
            "--extradata" => {
                config.extradata_path = Some(PathBuf::from(value.ok_or("경로 필요")?));
                i += 1;
            }
            "--frame-size" => {
                config.frame_size = parse_value(value, "숫자")?;
                i += 1;
            }
            "--chunk-size" => {
                config.chunk_size = parse_value(value, "숫자")?;
                i += 1;
            }
            "--fps" => {
                config.fps = parse_value(value, "숫자")?;
                i += 1;
            }
            "--loss" => {
                config.impairment.loss_ratio = parse_ratio(value)?;
                i += 1;
            }
            "--duplicate" => {
                config.impairment.duplicate_ratio = parse_ratio(value)?;
                i += 1;
            }
            "--shuffle" => config.impairment.shuffle = true,
            "--repeat" | "-r" => config.repeat = true,
            "--help" | "-h" => {
                println!(
                    r#"VFR Server - Video Frame Reassembly 송신기

파일을 프레임으로 나눠 청크 단위로 UDP 전송

사용법:
  cargo run --release --bin vfr-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       로컬 바인드 주소 (기본: 0.0.0.0:0)
  -t, --target <ADDR>     수신기 주소 (기본: 127.0.0.1:5000)
  -f, --file <PATH>       전송할 스트림 파일 (없으면 테스트 데이터)
  --extradata <PATH>      먼저 보낼 코덱 설정 파일
  --frame-size <SIZE>     프레임 크기 바이트 (기본: 65536)
  --chunk-size <SIZE>     청크 페이로드 크기 (기본: 1400)
  --fps <N>               초당 프레임 수 (기본: 60)
  --loss <RATIO>          데이터그램 손실 비율 0.0~1.0
  --duplicate <RATIO>     데이터그램 중복 비율 0.0~1.0
  --shuffle               프레임 내 청크 순서 뒤섞기
  -r, --repeat            파일 끝에서 처음부터 반복
  -h, --help              이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => return Err(format!("알 수 없는 옵션: {}", other)),
        }
        i += 1;
    }

    if config.frame_size == 0 || config.chunk_size == 0 || config.fps == 0 {
        return Err("frame-size, chunk-size, fps는 0보다 커야 함".into());
    }
    Ok(config)
}

fn parse_value<T: std::str::FromStr>(value: Option<&String>, what: &str) -> Result<T, String> {
    value
        .ok_or_else(|| format!("{} 필요", what))?
        .parse()
        .map_err(|_| format!("유효한 {} 필요", what))
}

fn parse_ratio(value: Option<&String>) -> Result<f64, String> {
    let ratio: f64 = parse_value(value, "비율")?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(format!("비율은 0.0~1.0 범위여야 함: {}", ratio));
    }
    Ok(ratio)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let server_config = parse_args()?;

    info!("VFR Server starting...");
    info!("Target: {}", server_config.target);
    info!("Frame size: {} bytes", server_config.frame_size);
    info!("Chunk size: {} bytes", server_config.chunk_size);
    info!("FPS: {}", server_config.fps);

    // 전송할 데이터 준비
    let data = if let Some(path) = &server_config.file_path {
        info!("Loading file: {:?}", path);
        std::fs::read(path)?
    } else {
        // 테스트용 더미 데이터 (4MB)
        info!("Using test data (4MB)");
        (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect()
    };
    if data.is_empty() {
        return Err("전송할 데이터가 비어 있음".into());
    }

    let mut sender = FrameSender::bind(
        server_config.bind_addr,
        server_config.target,
        server_config.chunk_size,
    )
    .await?
    .with_impairment(server_config.impairment.clone());

    if let Some(path) = &server_config.extradata_path {
        let extradata = std::fs::read(path)?;
        sender.send_extradata(&extradata).await?;
        info!("Extradata sent ({} bytes)", extradata.len());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / server_config.fps as f64));
    let start = Instant::now();
    let total_frames = data.len().div_ceil(server_config.frame_size);

    loop {
        for (index, frame) in data.chunks(server_config.frame_size).enumerate() {
            ticker.tick().await;
            let frame_id = sender.send_frame(frame).await?;

            if (index + 1) % (server_config.fps as usize) == 0 || index + 1 == total_frames {
                info!(
                    "Progress: frame {} ({}/{}), {} datagrams sent",
                    frame_id,
                    index + 1,
                    total_frames,
                    sender.stats().datagrams_sent
                );
            }
        }

        if !server_config.repeat {
            break;
        }
    }

    let elapsed = start.elapsed();
    let stats = sender.stats();
    info!("Transfer complete!");
    info!("  Time: {:.2}s", elapsed.as_secs_f64());
    info!("  Frames: {}", stats.frames_sent);
    info!("  Datagrams: {} sent, {} withheld", stats.datagrams_sent, stats.datagrams_withheld);
    info!(
        "  Throughput: {:.2} MB/s",
        stats.bytes_sent as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );

    Ok(())
}
