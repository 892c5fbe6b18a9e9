//! Extrapolation of edge and corner cells from data lying just outside of
//! the output grid.
//!
//! While accumulating, input cells whose tags fall in the virtual bin just
//! past an edge (bin `-1` or bin `n`) are averaged into a buffer that runs
//! along that edge. Cells past both an X edge and a Y edge also go into one
//! of four corner buffers. After the interior has been gap-filled, each
//! buffer brackets the empty cells at the end of its lanes.
//!
//! All positions are internal coordinates, so on a logarithmic axis the
//! interpolation is linear in the log of the tag.

use crate::binning::{Edge, RebinContext, Target, corner_index};
use ndarray::{Array2, ArrayViewMut2, Axis};
use tablebin_internal::{
    AxisBins, Datum, LaneBracket, Mean, Reducer, StatePack, interpolate_lane_ends,
    values_from_statepack,
};

/// Accumulators for the virtual bins surrounding the output grid
pub(crate) struct BoundaryBuffers {
    // indexed by Edge::index(). The XMin & XMax buffers run along Y, the YMin
    // and YMax buffers run along X
    edges: [StatePack; 4],
    corners: StatePack,
}

/// the weighted means held by a buffer, with shape `[2, n]`
struct BufferValues {
    stats: Array2<f64>,
}

impl BufferValues {
    fn bracket(&self, k: usize, position: f64) -> Option<LaneBracket> {
        let value = self.stats[[Mean::VALUE_MEAN, k]];
        let weight = self.stats[[Mean::VALUE_WEIGHT, k]];
        (weight > 0.0 && value.is_finite()).then_some(LaneBracket {
            position,
            value,
            weight,
        })
    }
}

/// Bilinear interpolation from the four corners of the rectangle
/// `[x0, x1] x [y0, y1]`. `q[a][b]` is the sample at `(x_a, y_b)`.
fn bilinear(x: [f64; 2], y: [f64; 2], q: [[f64; 2]; 2], at: (f64, f64)) -> f64 {
    let tx = (at.0 - x[0]) / (x[1] - x[0]);
    let ty = (at.1 - y[0]) / (y[1] - y[0]);
    q[0][0] * (1.0 - tx) * (1.0 - ty)
        + q[1][0] * tx * (1.0 - ty)
        + q[0][1] * (1.0 - tx) * ty
        + q[1][1] * tx * ty
}

impl BoundaryBuffers {
    pub(crate) fn new(nx: usize, ny: usize) -> Self {
        let len = |edge: Edge| match edge {
            Edge::XMin | Edge::XMax => ny,
            Edge::YMin | Edge::YMax => nx,
        };
        Self {
            edges: Edge::ALL.map(|edge| StatePack::new(&Mean, len(edge))),
            corners: StatePack::new(&Mean, 4),
        }
    }

    /// routes a contribution reported by [`RebinContext::visit`]
    pub(crate) fn consume(&mut self, target: Target, datum: &Datum) {
        match target {
            Target::Edge(edge, k) => {
                Mean.consume(&mut self.edges[edge.index()].get_state_mut(k), datum)
            }
            Target::Corner(k) => Mean.consume(&mut self.corners.get_state_mut(k), datum),
            Target::Bin(_) => {}
        }
    }

    /// Fills empty cells along the edges, and then in the corners, of the
    /// `[nx, ny]` grid. Edges are only handled for axes that are binned.
    ///
    /// Returns the number of cells that were filled.
    pub(crate) fn extrapolate(
        &self,
        ctx: &RebinContext,
        values: &mut ArrayViewMut2<f64>,
        weights: &mut ArrayViewMut2<f64>,
    ) -> usize {
        let (nx, ny) = values.dim();
        let edges = Edge::ALL.map(|edge| BufferValues {
            stats: values_from_statepack(&Mean, &self.edges[edge.index()]),
        });
        let x_bins = ctx.geometry.x_axis.map(|axis| axis.bins());
        let y_bins = ctx.geometry.y_axis.map(|axis| axis.bins());

        let mut n_filled = 0;
        if let Some(bins) = x_bins {
            let (before, after) = virtual_positions(bins);
            for iy in 0..ny {
                n_filled += interpolate_lane_ends(
                    &mut values.index_axis_mut(Axis(1), iy),
                    &mut weights.index_axis_mut(Axis(1), iy),
                    &ctx.x_positions,
                    edges[Edge::XMin.index()].bracket(iy, before),
                    edges[Edge::XMax.index()].bracket(iy, after),
                    ctx.x_span,
                );
            }
        }
        if let Some(bins) = y_bins {
            let (before, after) = virtual_positions(bins);
            for ix in 0..nx {
                n_filled += interpolate_lane_ends(
                    &mut values.index_axis_mut(Axis(0), ix),
                    &mut weights.index_axis_mut(Axis(0), ix),
                    &ctx.y_positions,
                    edges[Edge::YMin.index()].bracket(ix, before),
                    edges[Edge::YMax.index()].bracket(ix, after),
                    ctx.y_span,
                );
            }
        }

        if let (Some(x_bins), Some(y_bins)) = (x_bins, y_bins) {
            if nx >= 2 && ny >= 2 {
                let corners = BufferValues {
                    stats: values_from_statepack(&Mean, &self.corners),
                };
                let x_virtual = virtual_positions(x_bins);
                let y_virtual = virtual_positions(y_bins);
                for x_edge in [Edge::XMin, Edge::XMax] {
                    for y_edge in [Edge::YMin, Edge::YMax] {
                        let (cx, ix_in, vx) = if x_edge == Edge::XMin {
                            (0, 1, x_virtual.0)
                        } else {
                            (nx - 1, nx - 2, x_virtual.1)
                        };
                        let (cy, iy_in, vy) = if y_edge == Edge::YMin {
                            (0, 1, y_virtual.0)
                        } else {
                            (ny - 1, ny - 2, y_virtual.1)
                        };
                        if weights[[cx, cy]] > 0.0 {
                            continue;
                        }
                        let x = [vx, ctx.x_positions[ix_in]];
                        let y = [vy, ctx.y_positions[iy_in]];
                        if (x[1] - x[0]).abs() > ctx.x_span || (y[1] - y[0]).abs() > ctx.y_span {
                            continue;
                        }

                        let interior = (weights[[ix_in, iy_in]] > 0.0).then_some(LaneBracket {
                            position: 0.0,
                            value: values[[ix_in, iy_in]],
                            weight: weights[[ix_in, iy_in]],
                        });
                        let samples = [
                            corners.bracket(corner_index(x_edge, y_edge), 0.0),
                            edges[x_edge.index()].bracket(iy_in, 0.0),
                            edges[y_edge.index()].bracket(ix_in, 0.0),
                            interior,
                        ];
                        let [Some(q_vv), Some(q_vi), Some(q_iv), Some(q_ii)] = samples else {
                            continue;
                        };

                        let at = (ctx.x_positions[cx], ctx.y_positions[cy]);
                        values[[cx, cy]] = bilinear(
                            x,
                            y,
                            [[q_vv.value, q_vi.value], [q_iv.value, q_ii.value]],
                            at,
                        );
                        weights[[cx, cy]] = bilinear(
                            x,
                            y,
                            [[q_vv.weight, q_vi.weight], [q_iv.weight, q_ii.weight]],
                            at,
                        );
                        n_filled += 1;
                    }
                }
            }
        }
        n_filled
    }
}

/// the internal positions of the virtual bins just before and just after
/// the grid
fn virtual_positions(bins: &AxisBins) -> (f64, f64) {
    (bins.internal_center(-1), bins.internal_center(bins.n_bins() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_reproduces_planes() {
        // f(x, y) = 1 + 2x + 3y is reproduced exactly
        let f = |x: f64, y: f64| 1.0 + 2.0 * x + 3.0 * y;
        let (x, y) = ([-1.0, 1.0], [-1.0, 1.0]);
        let q = [[f(-1.0, -1.0), f(-1.0, 1.0)], [f(1.0, -1.0), f(1.0, 1.0)]];
        assert_eq!(bilinear(x, y, q, (0.0, 0.0)), 1.0);
        assert_eq!(bilinear(x, y, q, (1.0, 1.0)), f(1.0, 1.0));
    }

    #[test]
    fn buffers_route_contributions() {
        let mut buffers = BoundaryBuffers::new(3, 2);
        let datum = Datum {
            value: 4.0,
            weight: 0.5,
        };
        buffers.consume(Target::Edge(Edge::XMax, 1), &datum);
        buffers.consume(Target::Corner(3), &datum);
        buffers.consume(Target::Bin(0), &datum);

        let stats = values_from_statepack(&Mean, &buffers.edges[Edge::XMax.index()]);
        assert_eq!(stats.shape(), &[2, 2]);
        assert_eq!(stats[[Mean::VALUE_MEAN, 1]], 4.0);
        assert_eq!(stats[[Mean::VALUE_WEIGHT, 0]], 0.0);
        assert_eq!(buffers.edges[Edge::YMin.index()].n_states(), 3);

        let corners = BufferValues {
            stats: values_from_statepack(&Mean, &buffers.corners),
        };
        assert!(corners.bracket(0, 0.0).is_none());
        assert_eq!(corners.bracket(3, 0.0).map(|b| b.value), Some(4.0));
    }
}
