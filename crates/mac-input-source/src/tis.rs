//! Raw Carbon Text Input Source bindings and CF property helpers.

use std::{ffi::c_void, path::PathBuf, ptr};

use core_foundation::{
    array::{CFArray, CFArrayRef},
    base::{Boolean, CFRelease, CFType, CFTypeRef, OSStatus, TCFType},
    boolean::{CFBoolean, CFBooleanRef},
    dictionary::{CFDictionary, CFDictionaryRef},
    string::{CFString, CFStringRef},
    url::{CFURL, CFURLRef},
};

use crate::InputSource;

/// Opaque `TISInputSourceRef`.
pub(crate) type TISInputSourceRef = *const c_void;

#[link(name = "Carbon", kind = "framework")]
unsafe extern "C" {
    fn TISCreateInputSourceList(
        properties: CFDictionaryRef,
        include_all_installed: Boolean,
    ) -> CFArrayRef;
    fn TISCopyCurrentKeyboardInputSource() -> TISInputSourceRef;
    fn TISSelectInputSource(source: TISInputSourceRef) -> OSStatus;
    fn TISGetInputSourceProperty(source: TISInputSourceRef, key: CFStringRef) -> *const c_void;

    static kTISPropertyInputSourceID: CFStringRef;
    static kTISPropertyLocalizedName: CFStringRef;
    static kTISPropertyInputSourceCategory: CFStringRef;
    static kTISPropertyInputSourceIsSelectCapable: CFStringRef;
    static kTISPropertyIconImageURL: CFStringRef;
    static kTISCategoryKeyboardInputSource: CFStringRef;
}

/// Read a string-valued property. The returned reference follows the get rule.
unsafe fn string_property(source: TISInputSourceRef, key: CFStringRef) -> Option<String> {
    let raw = unsafe { TISGetInputSourceProperty(source, key) };
    if raw.is_null() {
        return None;
    }
    // SAFETY: string-valued TIS properties are CFStringRefs owned by the source
    let s = unsafe { CFString::wrap_under_get_rule(raw as CFStringRef) };
    Some(s.to_string())
}

/// Read a boolean-valued property; absent counts as false.
unsafe fn bool_property(source: TISInputSourceRef, key: CFStringRef) -> bool {
    let raw = unsafe { TISGetInputSourceProperty(source, key) };
    if raw.is_null() {
        return false;
    }
    let b = unsafe { CFBoolean::wrap_under_get_rule(raw as CFBooleanRef) };
    bool::from(b)
}

/// Read a URL-valued property as a filesystem path.
unsafe fn path_property(source: TISInputSourceRef, key: CFStringRef) -> Option<PathBuf> {
    let raw = unsafe { TISGetInputSourceProperty(source, key) };
    if raw.is_null() {
        return None;
    }
    let url = unsafe { CFURL::wrap_under_get_rule(raw as CFURLRef) };
    url.to_path()
}

/// Metadata of a single source, plus whether it is a selectable keyboard source.
unsafe fn describe(source: TISInputSourceRef) -> Option<(InputSource, bool)> {
    unsafe {
        let id = string_property(source, kTISPropertyInputSourceID)?;
        let name = string_property(source, kTISPropertyLocalizedName)?;
        let category = string_property(source, kTISPropertyInputSourceCategory).unwrap_or_default();
        let keyboard = CFString::wrap_under_get_rule(kTISCategoryKeyboardInputSource).to_string();
        let selectable = category == keyboard
            && bool_property(source, kTISPropertyInputSourceIsSelectCapable);
        let icon_url = path_property(source, kTISPropertyIconImageURL);
        Some((InputSource { id, name, icon_url }, selectable))
    }
}

/// Enabled input sources, optionally filtered to an exact source id.
///
/// The array owns the sources; `visit` sees each raw ref while it is alive and
/// may stop iteration by returning `Some`.
pub(crate) fn with_sources<R>(
    id: Option<&str>,
    mut visit: impl FnMut(TISInputSourceRef) -> Option<R>,
) -> Option<R> {
    let filter: Option<CFDictionary<CFString, CFType>> = id.map(|id| {
        let key = unsafe { CFString::wrap_under_get_rule(kTISPropertyInputSourceID) };
        CFDictionary::from_CFType_pairs(&[(key, CFString::new(id).as_CFType())])
    });
    let props = filter
        .as_ref()
        .map(|d| d.as_concrete_TypeRef())
        .unwrap_or(ptr::null());
    let raw = unsafe { TISCreateInputSourceList(props, 0) };
    if raw.is_null() {
        return None;
    }
    // SAFETY: TISCreateInputSourceList follows the create rule
    let arr: CFArray<CFType> = unsafe { CFArray::wrap_under_create_rule(raw) };
    arr.iter().find_map(|item| visit(item.as_CFTypeRef()))
}

/// All enabled sources with their metadata.
pub(crate) fn list_all() -> Vec<(InputSource, bool)> {
    let mut out = Vec::new();
    with_sources::<()>(None, |src| {
        if let Some(entry) = unsafe { describe(src) } {
            out.push(entry);
        }
        None
    });
    out
}

/// Metadata for the enabled source whose id equals `id`.
pub(crate) fn find(id: &str) -> Option<InputSource> {
    with_sources(Some(id), |src| unsafe { describe(src) }.map(|(s, _)| s))
}

/// Select the source whose id equals `id`.
///
/// Returns `None` when no such source exists, otherwise the OS status code.
pub(crate) fn select(id: &str) -> Option<OSStatus> {
    with_sources(Some(id), |src| Some(unsafe { TISSelectInputSource(src) }))
}

/// Identifier of the currently selected keyboard input source.
pub(crate) fn current_id() -> Option<String> {
    unsafe {
        let current = TISCopyCurrentKeyboardInputSource();
        if current.is_null() {
            return None;
        }
        let id = string_property(current, kTISPropertyInputSourceID);
        CFRelease(current as CFTypeRef);
        id
    }
}
