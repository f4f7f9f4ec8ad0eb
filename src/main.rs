//! Headless reference front end.
//!
//! Loads a BIOS and a cartridge image, then drives the core frame by frame
//! until the process is stopped or the core halts on a diagnostic. Save
//! memory is persisted to `<rom>.sav` next to the cartridge.
//!
//! Exit codes: 0 on clean shutdown, 1 on argument errors, 2 when the BIOS
//! or ROM cannot be loaded.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use emu::gba::{BIOS_SIZE, Gba};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_on_file: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_on_file {
        let appender = tracing_appender::rolling::never(".", "tangerine.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

fn bios_path() -> PathBuf {
    std::env::var_os("TANGERINE_BIOS")
        .map_or_else(|| PathBuf::from("gba_bios.bin"), PathBuf::from)
}

fn load_bios(path: &Path) -> Result<Vec<u8>, String> {
    let bios =
        std::fs::read(path).map_err(|e| format!("can't open BIOS {}: {e}", path.display()))?;
    if bios.len() != BIOS_SIZE {
        return Err(format!(
            "BIOS {} is {} bytes, expected {BIOS_SIZE}",
            path.display(),
            bios.len()
        ));
    }
    Ok(bios)
}

fn save_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("sav")
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(rom_arg) = args.next() else {
        eprintln!("Usage: tangerine <path_to_rom> [--log-on-file]");
        return ExitCode::from(1);
    };

    let log_on_file = match args.next().as_deref() {
        None => false,
        Some("--log-on-file") => true,
        Some(other) => {
            eprintln!("unknown argument: {other}");
            return ExitCode::from(1);
        }
    };

    let _log_guard = init_tracing(log_on_file);

    let rom_path = PathBuf::from(rom_arg);
    let rom = match std::fs::read(&rom_path) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("tangerine: can't open {}: {e}", rom_path.display());
            return ExitCode::from(2);
        }
    };

    let bios = match load_bios(&bios_path()) {
        Ok(bios) => bios,
        Err(e) => {
            eprintln!("tangerine: {e}");
            return ExitCode::from(2);
        }
    };

    let mut gba = match Gba::new(&bios, &rom) {
        Ok(gba) => gba,
        Err(e) => {
            eprintln!("tangerine: can't start {}: {e}", rom_path.display());
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        "loaded {} ({}, backup: {:?})",
        gba.cartridge_header.game_title,
        gba.cartridge_header.game_code,
        gba.cartridge_header.backup_kind,
    );

    let save_file = save_path(&rom_path);
    if let Ok(save) = std::fs::read(&save_file) {
        tracing::info!("restoring save data from {}", save_file.display());
        gba.load_save_data(&save);
    }

    loop {
        gba.step_frame();

        if let Some(reason) = gba.halted() {
            eprintln!("tangerine: core halted: {reason}");
            let dump = gba.state_dump();
            eprintln!("{dump:#X?}");
            break;
        }
    }

    if let Err(e) = std::fs::write(&save_file, gba.save_data()) {
        tracing::warn!("couldn't persist save data: {e}");
    }

    ExitCode::SUCCESS
}
