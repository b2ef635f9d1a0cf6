use crate::prelude::LatLng;

/// Axis-aligned lat/lng rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    pub fn from_point(point: LatLng) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    /// Smallest bounds covering every position, or `None` for an empty set.
    pub fn from_positions<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = positions.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for position in iter {
            bounds.extend(position);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    /// Grows each side by `ratio` of the current span. Latitude stays within ±90.
    pub fn pad(&self, ratio: f64) -> Self {
        let lat_buffer = (self.north_east.lat - self.south_west.lat).abs() * ratio;
        let lng_buffer = (self.north_east.lng - self.south_west.lng).abs() * ratio;
        Self {
            south_west: LatLng::new(
                (self.south_west.lat - lat_buffer).max(-90.0),
                self.south_west.lng - lng_buffer,
            ),
            north_east: LatLng::new(
                (self.north_east.lat + lat_buffer).min(90.0),
                self.north_east.lng + lng_buffer,
            ),
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn contains(&self, point: LatLng) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }

    pub fn lat_span(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    pub fn lng_span(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_all_positions() {
        let bounds = Bounds::from_positions([
            LatLng::new(9.9, -84.1),
            LatLng::new(10.1, -83.9),
            LatLng::new(10.0, -84.3),
        ])
        .unwrap();
        assert_eq!(bounds.south_west, LatLng::new(9.9, -84.3));
        assert_eq!(bounds.north_east, LatLng::new(10.1, -83.9));
        assert!(Bounds::from_positions(std::iter::empty()).is_none());
    }

    #[test]
    fn padding_grows_by_span_ratio() {
        let bounds = Bounds::from_positions([LatLng::new(0.0, 0.0), LatLng::new(10.0, 20.0)])
            .unwrap()
            .pad(0.1);
        assert!((bounds.south_west.lat + 1.0).abs() < 1e-9);
        assert!((bounds.north_east.lng - 22.0).abs() < 1e-9);
        assert!(bounds.contains(LatLng::new(5.0, 10.0)));
    }
}
