// cm_public.rs — process-wide collision world used by the server and game code

use parking_lot::Mutex;

use qclip_common::common::com_printf;
use qclip_common::cvar::{cvar_init, with_cvar_ctx};
use qclip_common::q_shared::{Trace, Vec3};

use crate::cm_load::WorldParts;
use crate::cm_local::*;

static CM_CTX: Mutex<Option<ClipMap>> = Mutex::new(None);

/// Install an empty world and register the collision cvars.
pub fn cm_init() {
    cvar_init();
    let config = with_cvar_ctx(CmConfig::register).unwrap_or_default();

    let mut cm = ClipMap::empty();
    cm.set_config(config);
    *CM_CTX.lock() = Some(cm);
}

/// Access the global world with a closure. Returns None if not initialized.
pub fn with_cm_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut ClipMap) -> R,
{
    CM_CTX.lock().as_mut().map(f)
}

/// Install a world built from `parts` and return its checksum. Loading the
/// same map again keeps the current world, visit stamps and statistics
/// included. An empty name clears the world.
pub fn cm_load_map(name: &str, parts: WorldParts) -> u16 {
    let config = with_cvar_ctx(CmConfig::register).unwrap_or_default();

    if name.is_empty() {
        let mut cm = ClipMap::empty();
        cm.set_config(config);
        *CM_CTX.lock() = Some(cm);
        return 0;
    }

    let cm = ClipMap::load(name, parts, config);
    let checksum = cm.checksum;

    let mut g = CM_CTX.lock();
    if let Some(current) = g.as_mut() {
        if current.name == name && current.checksum == checksum {
            com_printf(&format!("CM_LoadMap: {} already loaded\n", name));
            current.set_config(config);
            return checksum;
        }
    }
    *g = Some(cm);
    checksum
}

/// `cm_noCurves` and `cm_optimize` take effect on the next trace. The shape
/// policy is latched and only changes when a map is loaded.
fn modified_toggles() -> Option<CmConfig> {
    with_cvar_ctx(|cvars| {
        let no_curves = cvars.take_modified("cm_noCurves");
        let optimize = cvars.take_modified("cm_optimize");
        (no_curves || optimize).then(|| CmConfig::from_cvars(cvars))
    })
    .flatten()
}

/// Like `with_cm_ctx`, after applying any toggle changes to the world.
fn with_current_cm<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut ClipMap) -> R,
{
    let toggles = modified_toggles();
    with_cm_ctx(|cm| {
        if let Some(t) = toggles {
            cm.set_config(CmConfig {
                policy: cm.config.policy,
                ..t
            });
        }
        f(cm)
    })
}

pub fn cm_box_trace(
    start: &Vec3,
    end: &Vec3,
    mins: Option<&Vec3>,
    maxs: Option<&Vec3>,
    model: ClipHandle,
    brushmask: i32,
    capsule: bool,
) -> Trace {
    with_current_cm(|cm| cm.box_trace(start, end, mins, maxs, model, brushmask, capsule)).unwrap_or(Trace {
        endpos: *end,
        ..Default::default()
    })
}

#[allow(clippy::too_many_arguments)]
pub fn cm_transformed_box_trace(
    start: &Vec3,
    end: &Vec3,
    mins: Option<&Vec3>,
    maxs: Option<&Vec3>,
    model: ClipHandle,
    brushmask: i32,
    origin: &Vec3,
    angles: &Vec3,
    capsule: bool,
) -> Trace {
    with_current_cm(|cm| cm.transformed_box_trace(start, end, mins, maxs, model, brushmask, origin, angles, capsule))
        .unwrap_or(Trace {
            endpos: *end,
            ..Default::default()
        })
}

pub fn cm_point_contents(p: &Vec3, model: ClipHandle) -> i32 {
    with_cm_ctx(|cm| cm.point_contents(p, model)).unwrap_or(0)
}

pub fn cm_temp_box_model(mins: &Vec3, maxs: &Vec3, capsule: bool) -> ClipHandle {
    with_cm_ctx(|cm| cm.temp_box_model(mins, maxs, capsule)).unwrap_or(if capsule {
        CAPSULE_MODEL_HANDLE
    } else {
        BOX_MODEL_HANDLE
    })
}
