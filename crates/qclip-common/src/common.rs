// common.rs — console printing and error reporting shared by all crates

use parking_lot::Mutex;

pub const MAXPRINTMSG: usize = 4096;

// error codes for com_error
pub const ERR_FATAL: i32 = 0; // exit the entire game with a popup window
pub const ERR_DROP: i32 = 1; // print to console and abort the current operation
pub const ERR_QUIT: i32 = 2; // not an error, just a normal exit

// ============================================================
// Redirect buffer for Com_Printf
// ============================================================

static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);

/// Begin redirecting printf output into a buffer.
pub fn com_begin_redirect() {
    *RD_BUFFER.lock() = Some(String::new());
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    RD_BUFFER.lock().take()
}

// ============================================================
// Com_Printf / Com_DPrintf / Com_Error
// ============================================================

/// General-purpose print function. Prints to stdout and appends to redirect
/// buffer if one is active.
pub fn com_printf(msg: &str) {
    {
        let mut buf = RD_BUFFER.lock();
        if let Some(ref mut s) = *buf {
            if s.len() + msg.len() <= MAXPRINTMSG {
                s.push_str(msg);
            }
            return;
        }
    }
    print!("{}", msg);
}

/// Developer-only print, gated by the "developer" cvar.
pub fn com_dprintf(msg: &str) {
    if crate::cvar::cvar_variable_value("developer") == 0.0 {
        return;
    }
    com_printf(msg);
}

/// Engine error handler.
/// - `ERR_FATAL`: prints to stderr and panics.
/// - `ERR_DROP`: prints the error banner, then unwinds so the host can
///   abandon the current operation.
/// - `ERR_QUIT`: clean exit.
pub fn com_error(code: i32, msg: &str) -> ! {
    if code == ERR_FATAL {
        eprintln!("Error: {}", msg);
        panic!("Fatal error: {}", msg);
    } else if code == ERR_DROP {
        eprintln!("********************\nERROR: {}\n********************", msg);
        panic!("{}", msg);
    } else {
        println!("{}", msg);
        std::process::exit(0);
    }
}
