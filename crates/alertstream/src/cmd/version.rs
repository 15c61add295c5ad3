use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("alertstream {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: alertstream");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("ALERTSTREAM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: session={}, cli=true",
        cfg!(feature = "session")
    );
    println!(
        "defaults: boundary={}, buffer_ceiling={}, idle_timeout={}s",
        alertstream_frame::DEFAULT_BOUNDARY,
        alertstream_frame::DEFAULT_BUFFER_CEILING,
        alertstream_session::DEFAULT_IDLE_TIMEOUT.as_secs()
    );

    Ok(SUCCESS)
}
