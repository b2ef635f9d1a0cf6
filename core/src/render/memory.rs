use crate::geo::Bounds;
use crate::prelude::LatLng;
use crate::render::popup::PopupView;
use crate::render::surface::{
    Layer, LayerId, LegendLayer, MapSurface, MarkerLayer, PolylineLayer, SurfaceError,
};
use std::collections::{BTreeMap, HashSet};

/// Headless surface that keeps layers in memory.
///
/// Used for tests and for hosts that only need the resulting layer set.
/// Individual operations can be made to fail to exercise degraded rendering.
#[derive(Debug, Default)]
pub struct MemorySurface {
    ready: bool,
    released: bool,
    next_id: u64,
    layers: BTreeMap<LayerId, Layer>,
    center: Option<LatLng>,
    zoom: Option<u8>,
    fitted: Option<Bounds>,
    pans: Vec<LatLng>,
    prepare_calls: usize,
    refuse_prepare: bool,
    failing_kinds: HashSet<&'static str>,
    failing_removals: bool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `prepare` call fails.
    pub fn refusing_prepare(mut self) -> Self {
        self.refuse_prepare = true;
        self
    }

    /// Adding layers of this kind (see [`Layer::kind_name`]) fails.
    pub fn failing_adds_of(mut self, kind: &'static str) -> Self {
        self.failing_kinds.insert(kind);
        self
    }

    pub fn set_refuse_prepare(&mut self, refuse: bool) {
        self.refuse_prepare = refuse;
    }

    pub fn set_failing_removals(&mut self, failing: bool) {
        self.failing_removals = failing;
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&LayerId, &Layer)> {
        self.layers.iter()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.layers
            .values()
            .filter(|layer| layer.kind_name() == kind)
            .count()
    }

    pub fn markers(&self) -> Vec<(LayerId, &MarkerLayer)> {
        self.layers
            .iter()
            .filter_map(|(id, layer)| match layer {
                Layer::Marker(marker) => Some((*id, marker)),
                _ => None,
            })
            .collect()
    }

    pub fn polylines(&self) -> Vec<&PolylineLayer> {
        self.layers
            .values()
            .filter_map(|layer| match layer {
                Layer::Polyline(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn legend(&self) -> Option<&LegendLayer> {
        self.layers.values().find_map(|layer| match layer {
            Layer::Legend(legend) => Some(legend),
            _ => None,
        })
    }

    pub fn center(&self) -> Option<LatLng> {
        self.center
    }

    pub fn zoom(&self) -> Option<u8> {
        self.zoom
    }

    pub fn fitted(&self) -> Option<Bounds> {
        self.fitted
    }

    pub fn pans(&self) -> &[LatLng] {
        &self.pans
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn check_live(&self) -> Result<(), SurfaceError> {
        if self.released {
            Err(SurfaceError::Released)
        } else if !self.ready {
            Err(SurfaceError::NotReady("prepare has not succeeded".into()))
        } else {
            Ok(())
        }
    }
}

impl MapSurface for MemorySurface {
    fn prepare(&mut self) -> Result<(), SurfaceError> {
        self.prepare_calls += 1;
        if self.released {
            return Err(SurfaceError::Released);
        }
        if self.refuse_prepare {
            return Err(SurfaceError::NotReady("container unavailable".into()));
        }
        self.ready = true;
        Ok(())
    }

    fn add_layer(&mut self, layer: Layer) -> Result<LayerId, SurfaceError> {
        self.check_live()?;
        if self.failing_kinds.contains(layer.kind_name()) {
            return Err(SurfaceError::Backend(format!(
                "cannot add {} layer",
                layer.kind_name()
            )));
        }
        self.next_id += 1;
        let id = LayerId(self.next_id);
        self.layers.insert(id, layer);
        Ok(id)
    }

    fn remove_layer(&mut self, id: LayerId) -> Result<(), SurfaceError> {
        self.check_live()?;
        if self.failing_removals {
            return Err(SurfaceError::Backend(format!("cannot remove {id}")));
        }
        self.layers
            .remove(&id)
            .map(|_| ())
            .ok_or(SurfaceError::UnknownLayer(id))
    }

    fn update_marker(
        &mut self,
        id: LayerId,
        position: LatLng,
        popup: PopupView,
    ) -> Result<(), SurfaceError> {
        self.check_live()?;
        match self.layers.get_mut(&id) {
            Some(Layer::Marker(marker)) => {
                marker.position = position;
                marker.popup = popup;
                Ok(())
            }
            Some(_) => Err(SurfaceError::NotAMarker(id)),
            None => Err(SurfaceError::UnknownLayer(id)),
        }
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) -> Result<(), SurfaceError> {
        self.check_live()?;
        self.center = Some(center);
        self.zoom = Some(zoom);
        Ok(())
    }

    fn pan_to(&mut self, center: LatLng) -> Result<(), SurfaceError> {
        self.check_live()?;
        self.center = Some(center);
        self.pans.push(center);
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: Bounds) -> Result<(), SurfaceError> {
        self.check_live()?;
        self.center = Some(bounds.center());
        self.fitted = Some(bounds);
        Ok(())
    }

    fn release(&mut self) {
        self.layers.clear();
        self.released = true;
        self.ready = false;
    }
}
