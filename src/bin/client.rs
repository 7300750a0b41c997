//! VFR 클라이언트 (수신자) - Video Frame Reassembly
//!
//! UDP로 들어오는 청크를 프레임 단위로 재조립해 디코더로 넘긴다
//! - 순서 뒤바뀜/중복/손실 허용, 누락 데이터를 기다리지 않음
//! - 1초마다 FPS와 누적 드롭 수 출력
//!
//! 사용법:
//!   cargo run --release --bin vfr-client -- [PORT] [OPTIONS]
//!
//! 예시:
//!   # 기본 포트(5000)에서 수신
//!   cargo run --release --bin vfr-client
//!
//!   # 수신한 스트림을 파일로 덤프
//!   cargo run --release --bin vfr-client -- 6000 --output stream.obu

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vfr::decoder::{NullRenderer, PassthroughDecoder, Picture, Renderer, StreamWriter};
use vfr::{Config, Receiver, UdpTransport, DEFAULT_PORT};

/// 클라이언트 설정
struct ClientConfig {
    bind_addr: SocketAddr,
    output_path: Option<PathBuf>,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            output_path: None,
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<ClientConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = parse_value(value, "주소")?;
                i += 1;
            }
            "--port" | "-p" => {
                config.bind_addr.set_port(parse_value(value, "포트")?);
                i += 1;
            }
            "--output" | "-o" => {
                config.output_path = Some(PathBuf::from(value.ok_or("경로 필요")?));
                i += 1;
            }
            "--chunk-size" => {
                config.config.chunk_payload_size = parse_value(value, "숫자")?;
                i += 1;
            }
            "--timeout-ms" => {
                config.config.eviction_timeout_ms = parse_value(value, "숫자")?;
                i += 1;
            }
            "--max-pending" => {
                config.config.max_pending_frames = parse_value(value, "숫자")?;
                i += 1;
            }
            "--low-spec" => {
                let wire = (config.config.chunk_payload_size, config.config.eviction_timeout_ms);
                config.config = Config {
                    chunk_payload_size: wire.0,
                    eviction_timeout_ms: wire.1,
                    ..Config::low_spec()
                };
            }
            "--help" | "-h" => {
                println!(
                    r#"VFR Client - Video Frame Reassembly 수신기

UDP 청크를 프레임 단위로 재조립해 디코더로 전달
- 순서 뒤바뀜/중복/손실 허용
- 미완성 프레임은 타임아웃 후 제거

사용법:
  cargo run --release --bin vfr-client -- [PORT] [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:5000)
  -p, --port <PORT>       수신 포트 (위치 인자로도 지정 가능)
  -o, --output <PATH>     재조립된 스트림 저장 경로
  --chunk-size <SIZE>     청크 페이로드 최대 크기 (기본: 1400, 송신측과 같아야 함)
  --timeout-ms <MS>       미완성 프레임 타임아웃 (기본: 500)
  --max-pending <N>       동시 조립 프레임 상한 (기본: 64)
  --low-spec              저사양 기기용 설정
  -h, --help              이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            positional if !positional.starts_with('-') => {
                config.bind_addr.set_port(parse_value(Some(&positional.to_string()), "포트")?);
            }
            other => return Err(format!("알 수 없는 옵션: {}", other)),
        }
        i += 1;
    }

    let max_chunk = config.config.recv_buffer_size - vfr::HEADER_SIZE;
    if config.config.chunk_payload_size == 0 || config.config.chunk_payload_size > max_chunk {
        return Err(format!("chunk-size는 1~{} 범위여야 함", max_chunk));
    }
    Ok(config)
}

fn parse_value<T: std::str::FromStr>(value: Option<&String>, what: &str) -> Result<T, String> {
    value
        .ok_or_else(|| format!("{} 필요", what))?
        .parse()
        .map_err(|_| format!("유효한 {} 필요", what))
}

/// 출력 대상
enum Output {
    File(StreamWriter),
    Discard(NullRenderer),
}

impl Renderer<Picture> for Output {
    fn present(&mut self, picture: Picture) -> vfr::Result<()> {
        match self {
            Output::File(writer) => writer.present(picture),
            Output::Discard(null) => null.present(picture),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args()?;

    info!("VFR Client starting...");
    info!("Chunk size: {} bytes", client_config.config.chunk_payload_size);
    info!("Eviction timeout: {} ms", client_config.config.eviction_timeout_ms);

    let transport = UdpTransport::bind(client_config.bind_addr).await?;

    let output = match &client_config.output_path {
        Some(path) => Output::File(StreamWriter::create(path)?),
        None => Output::Discard(NullRenderer::default()),
    };

    let mut receiver = Receiver::new(client_config.config, transport, PassthroughDecoder::new(), output);

    // Ctrl-C로 종료
    let handle = receiver.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            handle.stop();
        }
    });

    receiver.run().await?;

    if let Output::File(writer) = receiver.renderer_mut() {
        writer.flush()?;
        info!("Saved {} frames ({} bytes)", writer.frames(), writer.bytes());
    }

    Ok(())
}
