//! Parsing of the parts of a GDML file needed to check an export: the volume tree and the
//! auxiliary side channel.
use std::{borrow::Cow, collections::BTreeMap, str::FromStr};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use super::writer::{COLOR_AUX, DETECTOR_AUX, DETECTOR_META_AUX};
use crate::{
    det_utils::DetectorKind,
    error::{GeomError, GeomResult},
    vis_utils::VisColor,
};

/// A `<physvol>` of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdmlPlacement {
    /// name of the placement
    pub name: String,
    /// placed logical volume
    pub volume: String,
    /// logical volume the placement is part of
    pub mother: String,
}

/// Content of a GDML file, as far as it is needed by the tools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GdmlSummary {
    /// logical volume names in file order
    pub volumes: Vec<String>,
    /// placements in file order
    pub placements: Vec<GdmlPlacement>,
    /// `rmg_color` of each volume that has one
    pub colors: BTreeMap<String, VisColor>,
    /// `(kind, placement, uid)` in file order
    pub detectors: Vec<(DetectorKind, String, u32)>,
    /// detector metadata per placement
    pub detector_metadata: BTreeMap<String, serde_json::Value>,
    /// name of the world volume
    pub world: Option<String>,
}
impl GdmlSummary {
    /// Placements of one detector kind.
    #[must_use]
    pub fn detectors_of(&self, kind: DetectorKind) -> Vec<(&str, u32)> {
        self.detectors
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, name, uid)| (name.as_str(), *uid))
            .collect()
    }
}

fn gdml_err(e: impl std::fmt::Display) -> GeomError {
    GeomError::Gdml(e.to_string())
}

fn attribute(e: &BytesStart, key: &str) -> GeomResult<Option<String>> {
    e.try_get_attribute(key)
        .map_err(gdml_err)?
        .map(|a| a.unescape_value().map(Cow::into_owned).map_err(gdml_err))
        .transpose()
}
fn required(e: &BytesStart, key: &str) -> GeomResult<String> {
    attribute(e, key)?.ok_or_else(|| {
        GeomError::Gdml(format!(
            "<{}> without {key} attribute",
            String::from_utf8_lossy(e.name().as_ref())
        ))
    })
}

#[derive(Debug, Clone, Copy)]
enum AuxGroup {
    Detector(DetectorKind),
    Meta,
    Other,
}

#[derive(Default)]
struct ParseState {
    summary: GdmlSummary,
    volume: Option<String>,
    in_physvol: bool,
    in_userinfo: bool,
    group: Option<AuxGroup>,
}
impl ParseState {
    fn start(&mut self, e: &BytesStart) -> GeomResult<()> {
        match e.name().as_ref() {
            b"volume" => {
                let name = required(e, "name")?;
                self.summary.volumes.push(name.clone());
                self.volume = Some(name);
            }
            b"physvol" => {
                let mother = self
                    .volume
                    .clone()
                    .ok_or_else(|| GeomError::Gdml("<physvol> outside of a volume".into()))?;
                self.summary.placements.push(GdmlPlacement {
                    name: required(e, "name")?,
                    volume: String::new(),
                    mother,
                });
                self.in_physvol = true;
            }
            b"userinfo" => self.in_userinfo = true,
            b"auxiliary" if self.in_userinfo => {
                let auxtype = required(e, "auxtype")?;
                let auxvalue = attribute(e, "auxvalue")?.unwrap_or_default();
                self.group = Some(match auxtype.as_str() {
                    DETECTOR_AUX => AuxGroup::Detector(
                        DetectorKind::from_str(&auxvalue).map_err(|_| {
                            GeomError::Gdml(format!("unknown detector kind {auxvalue}"))
                        })?,
                    ),
                    DETECTOR_META_AUX => AuxGroup::Meta,
                    _ => AuxGroup::Other,
                });
            }
            _ => {}
        }
        Ok(())
    }
    fn empty(&mut self, e: &BytesStart) -> GeomResult<()> {
        match e.name().as_ref() {
            b"volumeref" if self.in_physvol => {
                if let Some(p) = self.summary.placements.last_mut() {
                    p.volume = required(e, "ref")?;
                }
            }
            b"auxiliary" if self.in_userinfo => self.userinfo_entry(e)?,
            b"auxiliary" => {
                if let Some(volume) = &self.volume {
                    if required(e, "auxtype")? == COLOR_AUX {
                        let color = VisColor::from_aux_value(&required(e, "auxvalue")?)?;
                        self.summary.colors.insert(volume.clone(), color);
                    }
                }
            }
            b"world" => self.summary.world = Some(required(e, "ref")?),
            _ => {}
        }
        Ok(())
    }
    fn userinfo_entry(&mut self, e: &BytesStart) -> GeomResult<()> {
        let name = required(e, "auxtype")?;
        let value = required(e, "auxvalue")?;
        match self.group {
            Some(AuxGroup::Detector(kind)) => {
                let uid = value
                    .parse::<u32>()
                    .map_err(|e| GeomError::Gdml(format!("invalid uid {value} of {name}: {e}")))?;
                self.summary.detectors.push((kind, name, uid));
            }
            Some(AuxGroup::Meta) => {
                let meta = serde_json::from_str(&value).map_err(|e| {
                    GeomError::Gdml(format!("invalid detector metadata of {name}: {e}"))
                })?;
                self.summary.detector_metadata.insert(name, meta);
            }
            Some(AuxGroup::Other) | None => {}
        }
        Ok(())
    }
    fn end(&mut self, name: &[u8]) {
        match name {
            b"volume" => self.volume = None,
            b"physvol" => self.in_physvol = false,
            b"userinfo" => self.in_userinfo = false,
            b"auxiliary" => self.group = None,
            _ => {}
        }
    }
}

/// Parse a GDML document.
/// # Errors
/// This function returns an error if the document is not well-formed XML or the auxiliary
/// values cannot be interpreted.
pub fn parse_gdml(text: &str) -> GeomResult<GdmlSummary> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut state = ParseState::default();
    loop {
        match reader.read_event().map_err(|e| {
            GeomError::Gdml(format!(
                "malformed document at position {}: {e}",
                reader.buffer_position()
            ))
        })? {
            Event::Start(e) => state.start(&e)?,
            Event::Empty(e) => state.empty(&e)?,
            Event::End(e) => state.end(e.name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(state.summary)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    #[test]
    fn minimal_document() {
        let text = r#"<?xml version="1.0"?>
<gdml>
  <structure>
    <volume name="det">
      <materialref ref="G4_Ge"/>
      <solidref ref="det"/>
      <auxiliary auxtype="rmg_color" auxvalue="-1"/>
    </volume>
    <volume name="world">
      <physvol name="det_pv">
        <volumeref ref="det"/>
      </physvol>
    </volume>
  </structure>
  <userinfo>
    <auxiliary auxtype="RMG_detector" auxvalue="germanium">
      <auxiliary auxtype="det_pv" auxvalue="3"/>
    </auxiliary>
    <auxiliary auxtype="RMG_detector_meta" auxvalue="">
      <auxiliary auxtype="det_pv" auxvalue="{&quot;x&quot;: 1}"/>
    </auxiliary>
  </userinfo>
  <setup name="Default" version="1.0"><world ref="world"/></setup>
</gdml>"#;
        let summary = parse_gdml(text).unwrap();
        assert_eq!(summary.volumes, vec!["det", "world"]);
        assert_eq!(
            summary.placements,
            vec![GdmlPlacement {
                name: "det_pv".into(),
                volume: "det".into(),
                mother: "world".into()
            }]
        );
        assert_eq!(summary.colors.get("det"), Some(&VisColor::Invisible));
        assert_eq!(summary.detectors_of(DetectorKind::Germanium), vec![("det_pv", 3)]);
        assert_eq!(summary.detector_metadata["det_pv"], serde_json::json!({"x": 1}));
        assert_eq!(summary.world.as_deref(), Some("world"));
    }
    #[test]
    fn invalid_documents() {
        assert_matches!(parse_gdml("<gdml><volume></gdml>"), Err(GeomError::Gdml(_)));
        let bad_kind = r#"<gdml><userinfo><auxiliary auxtype="RMG_detector" auxvalue="neutron">
            </auxiliary></userinfo></gdml>"#;
        assert_matches!(parse_gdml(bad_kind), Err(GeomError::Gdml(_)));
        let bad_uid = r#"<gdml><userinfo><auxiliary auxtype="RMG_detector" auxvalue="optical">
            <auxiliary auxtype="s" auxvalue="x"/></auxiliary></userinfo></gdml>"#;
        assert_matches!(parse_gdml(bad_uid), Err(GeomError::Gdml(_)));
    }
}
