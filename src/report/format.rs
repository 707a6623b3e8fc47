//! Plain-text formatting of fit results.
//!
//! We keep formatting code in one place so the numerical code stays clean and
//! output changes are localized.

use crate::domain::{FitResult, FreeParameter};
use crate::report::PointResidual;

/// Format the fit summary: parameters, convergence, quality and metrics.
pub fn format_fit_summary(fit: &FitResult) -> String {
    let p = &fit.parameters;
    let mut out = String::new();

    out.push_str("=== drop-shape fit ===\n");
    out.push_str(&format!(
        "Status: {} ({:?}) after {} iterations\n",
        if fit.converged { "converged" } else { "not converged" },
        fit.termination,
        fit.iterations
    ));
    out.push_str(&format!("Orientation: {:?}\n", p.orientation));

    out.push_str("\nParameters:\n");
    for param in FreeParameter::ALL {
        out.push_str(&format!("- {:<16} {:.9e}\n", param.display_name(), p.get(param)));
    }
    out.push_str(&format!("- {:<16} {:.6e}\n", "density diff.", p.delta_rho));
    out.push_str(&format!("- {:<16} {:.6e}\n", "gravity", p.gravity));
    out.push_str(&format!("- {:<16} {:.6e}\n", "bond number", p.bond_number()));

    let q = &fit.quality;
    out.push_str("\nQuality:\n");
    out.push_str(&format!(
        "n={} free={} SSE={:.3e} RMSE={:.3e} max|r|={:.3e}\n",
        q.n_points, q.n_free, q.sse, q.rmse, q.max_abs_residual
    ));

    if let Some(m) = &fit.metrics {
        out.push_str("\nDrop:\n");
        out.push_str(&format!("- volume       {:.6e}\n", m.volume));
        out.push_str(&format!("- surface area {:.6e}\n", m.surface_area));
        out.push_str(&format!("- height       {:.6e}\n", m.height));
        out.push_str(&format!("- max radius   {:.6e}\n", m.max_radius));
        out.push_str(&format!(
            "- end angle    {:.4} rad ({:.2}°)\n",
            m.end_angle,
            m.end_angle.to_degrees()
        ));
        out.push_str(&format!("- cap. length  {:.6e}\n", m.capillary_length));
    }

    out
}

/// Format a residual table.
pub fn format_point_table(rows: &[PointResidual]) -> String {
    let mut out = String::new();
    let header = format!("{:>6} {:>14} {:>12} {:>10}\n", "point", "residual", "s", "phi");
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(format!("{:->6} {:->14} {:->12} {:->10}\n", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>6} {:>14.6e} {:>12} {:>10}\n",
                r.point_index,
                r.residual,
                fmt_opt(r.s, 6),
                fmt_opt(r.phi, 4),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(v) => format!("{v:.precision$e}"),
        None => "-".to_string(),
    }
}
