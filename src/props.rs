//! Property name lookup for kms objects.

use std::collections::HashMap;

use drm::control::{property, Device as ControlDevice, RawResourceHandle, ResourceHandle};

use crate::device::DrmDeviceFd;
use crate::error::{AccessError, Error};

/// Name → id mapping of the properties of a single kms object.
///
/// Property ids are not stable across devices, so every atomic request
/// builder resolves its properties by name through this catalog instead of
/// hardcoding ids. Fetched once per object and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PropertyCatalog {
    owner: RawResourceHandle,
    props: HashMap<String, property::Handle>,
}

impl PropertyCatalog {
    /// Read all properties of `object` from the device.
    pub fn fetch<T>(fd: &DrmDeviceFd, object: T) -> Result<PropertyCatalog, Error>
    where
        T: ResourceHandle,
    {
        let set = fd.get_properties(object).map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Error reading object properties",
                dev: fd.dev_path(),
                source,
            })
        })?;

        let (handles, _) = set.as_props_and_values();
        let mut props = HashMap::with_capacity(handles.len());
        for prop in handles {
            let info = fd.get_property(*prop).map_err(|source| {
                Error::Access(AccessError {
                    errmsg: "Error reading property info",
                    dev: fd.dev_path(),
                    source,
                })
            })?;
            props.insert(info.name().to_string_lossy().into_owned(), *prop);
        }

        Ok(PropertyCatalog {
            owner: object.into(),
            props,
        })
    }

    /// Look up a property id by its kernel name.
    pub fn get(&self, name: &'static str) -> Result<property::Handle, Error> {
        self.props
            .get(name)
            .copied()
            .ok_or(Error::UnknownProperty {
                handle: self.owner,
                name,
            })
    }

    /// The object this catalog was fetched for.
    pub fn owner(&self) -> RawResourceHandle {
        self.owner
    }

    #[cfg(test)]
    pub(crate) fn from_names(owner: RawResourceHandle, names: &[&str]) -> PropertyCatalog {
        use std::num::NonZeroU32;

        let props = names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let handle = property::Handle::from(NonZeroU32::new(idx as u32 + 1).unwrap());
                ((*name).to_owned(), handle)
            })
            .collect();
        PropertyCatalog { owner, props }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    #[test]
    fn lookup_by_name() {
        let owner = NonZeroU32::new(42).unwrap();
        let catalog = PropertyCatalog::from_names(owner, &["FB_ID", "CRTC_ID"]);

        assert!(catalog.get("FB_ID").is_ok());
        assert!(catalog.get("CRTC_ID").is_ok());
        assert_ne!(
            catalog.get("FB_ID").unwrap(),
            catalog.get("CRTC_ID").unwrap()
        );
    }

    #[test]
    fn missing_property_reports_owner_and_name() {
        let owner = NonZeroU32::new(7).unwrap();
        let catalog = PropertyCatalog::from_names(owner, &["FB_ID"]);

        match catalog.get("MODE_ID") {
            Err(Error::UnknownProperty { handle, name }) => {
                assert_eq!(handle, owner);
                assert_eq!(name, "MODE_ID");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
