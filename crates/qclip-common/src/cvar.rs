// cvar.rs — dynamic variable tracking

use crate::common::com_printf;
use crate::q_shared::{CvarFlags, CVAR_CHEAT, CVAR_LATCH, CVAR_ROM};

use std::collections::HashMap;

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub reset_string: String,
    pub latched_string: Option<String>,
    pub flags: CvarFlags,
    pub modified: bool,
    pub value: f32,
    pub integer: i32,
}

impl Cvar {
    fn assign(&mut self, value: &str) {
        self.string = value.to_string();
        self.value = value.parse::<f32>().unwrap_or(0.0);
        self.integer = self.value as i32;
        self.modified = true;
    }
}

/// The full cvar system context.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
    /// When false, CHEAT variables are pinned to their reset value.
    pub cheats_enabled: bool,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a cvar by name, returning its index.
    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    pub fn variable_integer(&self, name: &str) -> i32 {
        self.find_var(name).map_or(0, |var| var.integer)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: CvarFlags) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            let var = &mut self.cvar_vars[idx];
            var.flags |= flags;
            if var.reset_string.is_empty() {
                var.reset_string = value.to_string();
            }
            return idx;
        }

        let float_val = value.parse::<f32>().unwrap_or(0.0);
        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            reset_string: value.to_string(),
            latched_string: None,
            flags,
            modified: true,
            value: float_val,
            integer: float_val as i32,
        });
        self.cvar_index.insert(name.to_string(), idx);

        idx
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> usize {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, value, CvarFlags::USER_CREATED),
        };

        if !force {
            let flags = self.cvar_vars[idx].flags;
            if flags.contains(CVAR_ROM) {
                com_printf(&format!("{} is read only.\n", name));
                return idx;
            }

            if flags.contains(CVAR_CHEAT) && !self.cheats_enabled {
                com_printf(&format!("{} is cheat protected.\n", name));
                return idx;
            }

            if flags.contains(CVAR_LATCH) {
                let var = &mut self.cvar_vars[idx];
                if let Some(ref latched) = var.latched_string {
                    if value == latched {
                        return idx;
                    }
                } else if value == var.string {
                    return idx;
                }
                com_printf(&format!("{} will be changed upon restarting.\n", name));
                var.latched_string = Some(value.to_string());
                var.modified = true;
                return idx;
            }
        } else {
            self.cvar_vars[idx].latched_string = None;
        }

        if value == self.cvar_vars[idx].string {
            return idx; // not changed
        }

        self.cvar_vars[idx].assign(value);
        idx
    }

    /// Set a cvar value (respects ROM, CHEAT and LATCH flags).
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, false)
    }

    /// Force-set a cvar value (ignores ROM, CHEAT and LATCH).
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, true)
    }

    /// Apply all latched variable changes.
    pub fn get_latched_vars(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.assign(&latched);
            }
        }
    }

    /// Reset every CHEAT variable to its default (cheats were turned off).
    pub fn set_cheat_state(&mut self, enabled: bool) {
        self.cheats_enabled = enabled;
        if enabled {
            return;
        }
        for var in &mut self.cvar_vars {
            if var.flags.contains(CVAR_CHEAT) && var.string != var.reset_string {
                let reset = var.reset_string.clone();
                var.assign(&reset);
            }
        }
    }

    /// Returns whether the cvar changed since the last call, and clears the flag.
    pub fn take_modified(&mut self, name: &str) -> bool {
        match self.find_var_index(name) {
            Some(idx) => std::mem::replace(&mut self.cvar_vars[idx].modified, false),
            None => false,
        }
    }
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

use parking_lot::Mutex;

static CVAR_CTX: Mutex<Option<CvarContext>> = Mutex::new(None);

pub fn cvar_init() {
    let mut g = CVAR_CTX.lock();
    if g.is_none() {
        *g = Some(CvarContext::new());
    }
}

pub fn cvar_set(name: &str, value: &str) {
    if let Some(ref mut c) = *CVAR_CTX.lock() {
        c.set(name, value);
    }
}

pub fn cvar_variable_value(name: &str) -> f32 {
    CVAR_CTX.lock().as_ref().map_or(0.0, |c| c.variable_value(name))
}

/// Access the global CVAR_CTX with a closure. Returns None if not initialized.
pub fn with_cvar_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CvarContext) -> R,
{
    CVAR_CTX.lock().as_mut().map(f)
}

// ============================================================
// Tests
// ============================================================
