//! Standalone matplotlib programs, one body per chart type.
//!
//! Every program is `PREAMBLE + body + EPILOGUE`. The preamble parses the data,
//! style and options from JSON string literals and applies the style chrome;
//! the body draws onto `fig`/`ax` and calls `finish`; the epilogue hands the
//! figure to `plt.show()`, which the sandbox harness captures.

use super::TemplateOptions;
use crate::charts::{ChartType, DataPoint};
use crate::error::AppError;
use crate::theme::StyleRecord;

const PREAMBLE: &str = r##"import json
import math
from datetime import datetime, timedelta

import matplotlib
matplotlib.use("Agg")
import matplotlib.dates as mdates
import matplotlib.pyplot as plt
from matplotlib.colors import LinearSegmentedColormap
from matplotlib.patches import Patch, Rectangle
from matplotlib.ticker import PercentFormatter

DATA = json.loads(@@DATA@@)
STYLE = json.loads(@@STYLE@@)
OPTIONS = json.loads(@@OPTIONS@@)

CHROME = STYLE["chrome"]
COLORS = STYLE["series_colors"] or ["#1E40AF"]
EDGE = STYLE["edge_color"]
EDGE_WIDTH = STYLE["edge_width"]
ALPHA = STYLE["fill_alpha"]
CMAP = STYLE.get("colormap") or "Blues"
GRADIENT = STYLE.get("gradient_steps")

plt.rcParams.update({
    "font.family": CHROME["font_family"],
    "figure.facecolor": CHROME["background"],
    "axes.facecolor": CHROME["background"],
    "savefig.facecolor": CHROME["background"],
    "axes.edgecolor": CHROME["grid"],
    "axes.labelcolor": CHROME["text"],
    "axes.titlecolor": CHROME["text"],
    "text.color": CHROME["text"],
    "xtick.color": CHROME["text"],
    "ytick.color": CHROME["text"],
    "grid.color": CHROME["grid"],
    "grid.alpha": 0.8,
    "axes.grid": CHROME["show_grid"],
    "axes.axisbelow": True,
    "axes.spines.top": False,
    "axes.spines.right": False,
    "legend.frameon": False,
})


def color_at(i):
    return COLORS[i % len(COLORS)]


def ramp(n):
    if not GRADIENT or n <= 0:
        return [COLORS[0]] * max(n, 0)
    cmap = LinearSegmentedColormap.from_list("theme", GRADIENT)
    if n == 1:
        return [cmap(0.0)]
    return [cmap(i / (n - 1)) for i in range(n)]


def unique(items):
    seen = []
    for item in items:
        if item not in seen:
            seen.append(item)
    return seen


def aux(point, key, default=None):
    return (point.get("auxiliary") or {}).get(key, default)


def labels_and_values():
    return [p["label"] for p in DATA], [float(p["value"]) for p in DATA]


def series_name(point):
    return point.get("series") or "Series 1"


def series_table():
    xs = unique(p["label"] for p in DATA)
    names = unique(series_name(p) for p in DATA)
    table = {name: [0.0] * len(xs) for name in names}
    for p in DATA:
        table[series_name(p)][xs.index(p["label"])] = float(p["value"])
    return xs, names, table


def group_name(point):
    return point.get("category") or point.get("series") or "All"


def grouped_values():
    names = unique(group_name(p) for p in DATA)
    return names, [[float(p["value"]) for p in DATA if group_name(p) == name] for name in names]


def set_category_ticks(ax, labels, axis="x"):
    positions = list(range(len(labels)))
    if axis == "y":
        ax.set_yticks(positions)
        ax.set_yticklabels(labels)
        return
    crowded = len(labels) > 8 or max((len(str(l)) for l in labels), default=0) > 12
    ax.set_xticks(positions)
    ax.set_xticklabels(labels, rotation=45 if crowded else 0, ha="right" if crowded else "center")


def finish(ax, x_label=None, y_label=None):
    title = OPTIONS.get("title")
    if title:
        ax.set_title(title, fontsize=14, fontweight="bold", pad=14)
    x_label = OPTIONS.get("x_label") or x_label
    y_label = OPTIONS.get("y_label") or y_label
    if x_label:
        ax.set_xlabel(x_label)
    if y_label:
        ax.set_ylabel(y_label)

"##;

const EPILOGUE: &str = r##"
fig.tight_layout()
plt.show()
"##;

const LINE: &str = r##"labels, values = labels_and_values()
x = list(range(len(values)))
fig, ax = plt.subplots(figsize=(10, 6))
ax.plot(x, values, color=COLORS[0], linewidth=2.5, marker="o", markersize=5,
        markerfacecolor=COLORS[0], markeredgecolor=EDGE)
ax.fill_between(x, values, min(values), color=COLORS[0], alpha=ALPHA * 0.15)
set_category_ticks(ax, labels)
finish(ax, None, "Value")
"##;

const BAR_VERTICAL: &str = r##"labels, values = labels_and_values()
fig, ax = plt.subplots(figsize=(10, 6))
bars = ax.bar(range(len(values)), values, color=COLORS[0], alpha=ALPHA,
              edgecolor=EDGE, linewidth=EDGE_WIDTH)
ax.bar_label(bars, fmt="%.1f", padding=3)
set_category_ticks(ax, labels)
ax.grid(axis="x", visible=False)
finish(ax, None, "Value")
"##;

const BAR_HORIZONTAL: &str = r##"labels, values = labels_and_values()
fig, ax = plt.subplots(figsize=(10, max(4, 0.5 * len(values) + 1.5)))
bars = ax.barh(range(len(values)), values, color=COLORS[0], alpha=ALPHA,
               edgecolor=EDGE, linewidth=EDGE_WIDTH)
ax.bar_label(bars, fmt="%.1f", padding=3)
set_category_ticks(ax, labels, axis="y")
ax.invert_yaxis()
ax.grid(axis="y", visible=False)
finish(ax, "Value", None)
"##;

const HISTOGRAM: &str = r##"_, values = labels_and_values()
fig, ax = plt.subplots(figsize=(10, 6))
bins = min(30, max(5, int(math.sqrt(len(values)))))
_, _, patches = ax.hist(values, bins=bins, color=COLORS[0], alpha=ALPHA,
                        edgecolor=EDGE, linewidth=EDGE_WIDTH)
if GRADIENT:
    for patch, shade in zip(patches, ramp(len(patches))):
        patch.set_facecolor(shade)
mean = sum(values) / len(values)
ax.axvline(mean, color=EDGE, linestyle="--", linewidth=1.5, label="Mean {:.2f}".format(mean))
ax.legend()
finish(ax, "Value", "Frequency")
"##;

const BOX_PLOT: &str = r##"names, groups = grouped_values()
fig, ax = plt.subplots(figsize=(10, 6))
box = ax.boxplot(groups, patch_artist=True, widths=0.6)
for i, patch in enumerate(box["boxes"]):
    patch.set_facecolor(color_at(i))
    patch.set_alpha(ALPHA)
    patch.set_edgecolor(EDGE)
    patch.set_linewidth(EDGE_WIDTH)
for median in box["medians"]:
    median.set_color(EDGE)
    median.set_linewidth(2)
for key in ("whiskers", "caps", "fliers"):
    for artist in box[key]:
        artist.set_color(EDGE)
ax.set_xticks(range(1, len(names) + 1))
ax.set_xticklabels(names)
finish(ax, None, "Value")
"##;

const VIOLIN_PLOT: &str = r##"names, groups = grouped_values()
fig, ax = plt.subplots(figsize=(10, 6))
parts = ax.violinplot(groups, showmeans=False, showmedians=True)
for i, body in enumerate(parts["bodies"]):
    body.set_facecolor(color_at(i))
    body.set_edgecolor(EDGE)
    body.set_alpha(ALPHA)
for key in ("cmedians", "cmins", "cmaxes", "cbars"):
    if key in parts:
        parts[key].set_color(EDGE)
ax.set_xticks(range(1, len(names) + 1))
ax.set_xticklabels(names)
finish(ax, None, "Value")
"##;

const SCATTER: &str = r##"xs = [float(aux(p, "x")) for p in DATA]
ys = [float(aux(p, "y")) for p in DATA]
fig, ax = plt.subplots(figsize=(10, 6))
ax.scatter(xs, ys, s=60, color=COLORS[0], alpha=ALPHA, edgecolors=EDGE, linewidths=EDGE_WIDTH)
if len(set(xs)) > 1:
    n = len(xs)
    mean_x = sum(xs) / n
    mean_y = sum(ys) / n
    slope = sum((x - mean_x) * (y - mean_y) for x, y in zip(xs, ys)) / sum((x - mean_x) ** 2 for x in xs)
    intercept = mean_y - slope * mean_x
    ends = [min(xs), max(xs)]
    ax.plot(ends, [slope * x + intercept for x in ends], color=EDGE, linestyle="--",
            linewidth=1.5, label="Trend")
    ax.legend()
finish(ax, "X", "Y")
"##;

const BUBBLE: &str = r##"xs = [float(aux(p, "x")) for p in DATA]
ys = [float(aux(p, "y")) for p in DATA]
sizes = [float(p["value"]) for p in DATA]
peak = max(sizes) or 1.0
areas = [40 + 1500 * s / peak for s in sizes]
fig, ax = plt.subplots(figsize=(10, 6))
points = ax.scatter(xs, ys, s=areas, c=sizes, cmap=CMAP, alpha=ALPHA,
                    edgecolors=EDGE, linewidths=EDGE_WIDTH)
fig.colorbar(points, ax=ax, label="Size")
finish(ax, "X", "Y")
"##;

const HEXBIN: &str = r##"xs = [float(aux(p, "x")) for p in DATA]
ys = [float(aux(p, "y")) for p in DATA]
fig, ax = plt.subplots(figsize=(10, 6))
cells = ax.hexbin(xs, ys, gridsize=20, cmap=CMAP, mincnt=1,
                  edgecolors=CHROME["background"], linewidths=0.2)
fig.colorbar(cells, ax=ax, label="Count")
ax.grid(False)
finish(ax, "X", "Y")
"##;

const PIE: &str = r##"labels, values = labels_and_values()
fig, ax = plt.subplots(figsize=(8, 8))
_, _, pct_texts = ax.pie(
    values,
    labels=labels,
    colors=[color_at(i) for i in range(len(values))],
    autopct="%1.1f%%",
    startangle=90,
    counterclock=False,
    wedgeprops={"edgecolor": EDGE, "linewidth": EDGE_WIDTH, "alpha": ALPHA},
)
for text in pct_texts:
    text.set_color("white")
    text.set_fontweight("bold")
ax.axis("equal")
finish(ax)
"##;

const WATERFALL: &str = r##"labels, deltas = labels_and_values()
roles = STYLE.get("roles") or {"positive": color_at(1), "negative": color_at(2), "total": COLORS[0]}
bottoms, heights, colors, levels = [], [], [], []
running = 0.0
for delta in deltas:
    if delta >= 0:
        bottoms.append(running)
        heights.append(delta)
        colors.append(roles["positive"])
    else:
        bottoms.append(running + delta)
        heights.append(-delta)
        colors.append(roles["negative"])
    running += delta
    levels.append(running)
labels = labels + ["Total"]
bottoms.append(min(0.0, running))
heights.append(abs(running))
colors.append(roles["total"])
fig, ax = plt.subplots(figsize=(11, 6))
x = list(range(len(labels)))
bars = ax.bar(x, heights, bottom=bottoms, color=colors, alpha=ALPHA,
              edgecolor=EDGE, linewidth=EDGE_WIDTH, width=0.6)
for i, level in enumerate(levels):
    ax.plot([i + 0.3, i + 0.7], [level, level], color=EDGE, linewidth=1, linestyle=":")
for bar, value in zip(bars, deltas + [running]):
    top = bar.get_y() + bar.get_height()
    ax.annotate("{:+.1f}".format(value), (bar.get_x() + bar.get_width() / 2, top),
                xytext=(0, 3), textcoords="offset points", ha="center", fontsize=9)
ax.axhline(0, color=CHROME["grid"], linewidth=1)
set_category_ticks(ax, labels)
ax.legend(handles=[Patch(color=roles["positive"], label="Increase"),
                   Patch(color=roles["negative"], label="Decrease"),
                   Patch(color=roles["total"], label="Total")])
finish(ax, None, "Value")
"##;

const FUNNEL: &str = r##"labels, values = labels_and_values()
peak = max(values) or 1.0
first = values[0] or 1.0
fig, ax = plt.subplots(figsize=(10, 6))
n = len(values)
for i, (label, value) in enumerate(zip(labels, values)):
    width = value / peak
    row = n - 1 - i
    ax.barh(row, width, left=(1 - width) / 2, height=0.8, color=color_at(i), alpha=ALPHA,
            edgecolor=EDGE, linewidth=EDGE_WIDTH)
    ax.text(0.5, row, "{}\n{:,.0f} ({:.0f}%)".format(label, value, value / first * 100),
            ha="center", va="center", fontsize=10, fontweight="bold")
ax.set_xlim(0, 1)
ax.set_ylim(-0.6, n - 0.4)
ax.set_xticks([])
ax.set_yticks([])
ax.grid(False)
for spine in ax.spines.values():
    spine.set_visible(False)
finish(ax)
"##;

const RADAR: &str = r##"axes_labels = unique(p["label"] for p in DATA)
names = unique(series_name(p) for p in DATA)
angles = [2 * math.pi * i / len(axes_labels) for i in range(len(axes_labels))]
closed = angles + angles[:1]
fig, ax = plt.subplots(figsize=(8, 8), subplot_kw={"polar": True})
for i, name in enumerate(names):
    lookup = {p["label"]: float(p["value"]) for p in DATA if series_name(p) == name}
    ring = [lookup.get(label, 0.0) for label in axes_labels]
    ring = ring + ring[:1]
    ax.plot(closed, ring, color=color_at(i), linewidth=2, label=name)
    ax.fill(closed, ring, color=color_at(i), alpha=ALPHA * 0.3)
ax.set_xticks(angles)
ax.set_xticklabels(axes_labels)
if len(names) > 1:
    ax.legend(loc="upper right", bbox_to_anchor=(1.2, 1.1))
finish(ax)
"##;

const HEATMAP: &str = r##"rows = unique(p.get("category") for p in DATA)
cols = unique(p.get("series") for p in DATA)
grid = [[float("nan")] * len(cols) for _ in rows]
for p in DATA:
    grid[rows.index(p.get("category"))][cols.index(p.get("series"))] = float(p["value"])
finite = [v for row in grid for v in row if not math.isnan(v)]
fig, ax = plt.subplots(figsize=(max(6, 0.8 * len(cols) + 3), max(5, 0.6 * len(rows) + 2)))
if CMAP == "RdYlBu":
    bound = max((abs(v) for v in finite), default=1.0) or 1.0
    image = ax.imshow(grid, cmap=CMAP, vmin=-bound, vmax=bound, aspect="auto")
else:
    image = ax.imshow(grid, cmap=CMAP, aspect="auto")
set_category_ticks(ax, [str(c) for c in cols])
set_category_ticks(ax, [str(r) for r in rows], axis="y")
if len(rows) * len(cols) <= 150:
    for r, row in enumerate(grid):
        for c, value in enumerate(row):
            if not math.isnan(value):
                ax.text(c, r, "{:.2f}".format(value), ha="center", va="center", fontsize=9, color="black")
fig.colorbar(image, ax=ax)
ax.grid(False)
finish(ax)
"##;

const ERROR_BAR: &str = r##"labels, values = labels_and_values()
errors = [abs(float(aux(p, "error", 0.0))) for p in DATA]
x = list(range(len(values)))
fig, ax = plt.subplots(figsize=(10, 6))
ax.errorbar(x, values, yerr=errors, fmt="o", color=COLORS[0], ecolor=EDGE,
            elinewidth=EDGE_WIDTH, capsize=6, markersize=8, markeredgecolor=EDGE)
set_category_ticks(ax, labels)
finish(ax, None, "Value")
"##;

const CONTROL_CHART: &str = r##"labels, values = labels_and_values()
n = len(values)
mean = sum(values) / n
sd = math.sqrt(sum((v - mean) ** 2 for v in values) / (n - 1)) if n > 1 else 0.0
upper = mean + 3 * sd
lower = mean - 3 * sd
x = list(range(n))
fig, ax = plt.subplots(figsize=(11, 6))
ax.plot(x, values, color=COLORS[0], marker="o", linewidth=1.8, markersize=5,
        markeredgecolor=EDGE, label="Measurement")
ax.axhline(mean, color=color_at(1), linewidth=1.5, label="Mean {:.2f}".format(mean))
ax.axhline(upper, color=color_at(2), linestyle="--", linewidth=1.2, label="UCL {:.2f}".format(upper))
ax.axhline(lower, color=color_at(2), linestyle="--", linewidth=1.2, label="LCL {:.2f}".format(lower))
outside = [i for i, v in enumerate(values) if v > upper or v < lower]
if outside:
    ax.scatter(outside, [values[i] for i in outside], color=color_at(2), s=90, zorder=5,
               label="Out of control")
step = max(1, n // 12)
ax.set_xticks(x[::step])
ax.set_xticklabels(labels[::step], rotation=45, ha="right")
ax.legend(loc="best")
finish(ax, None, "Measurement")
"##;

const PARETO: &str = r##"pairs = sorted(zip(*labels_and_values()), key=lambda kv: kv[1], reverse=True)
labels = [label for label, _ in pairs]
values = [value for _, value in pairs]
total = sum(values) or 1.0
cumulative = []
running = 0.0
for value in values:
    running += value
    cumulative.append(running / total * 100)
x = list(range(len(values)))
fig, ax = plt.subplots(figsize=(11, 6))
ax.bar(x, values, color=COLORS[0], alpha=ALPHA, edgecolor=EDGE, linewidth=EDGE_WIDTH)
set_category_ticks(ax, labels)
share = ax.twinx()
share.plot(x, cumulative, color=color_at(1), marker="o", linewidth=2)
share.axhline(80, color=color_at(2), linestyle="--", linewidth=1.2)
share.set_ylim(0, 105)
share.yaxis.set_major_formatter(PercentFormatter())
share.grid(False)
share.spines["right"].set_visible(True)
finish(ax, None, "Frequency")
"##;

const GANTT: &str = r##"EPOCH = datetime(1970, 1, 1)


def to_date(value):
    if isinstance(value, (int, float)):
        return EPOCH + timedelta(days=float(value))
    text = str(value).strip()
    try:
        return datetime.strptime(text, "%Y-%m-%d")
    except ValueError:
        return EPOCH + timedelta(days=float(text))


def phase_of(point):
    return point.get("category") or "Tasks"


tasks = [p["label"] for p in DATA]
phases = unique(phase_of(p) for p in DATA)
fig, ax = plt.subplots(figsize=(11, max(4, 0.5 * len(tasks) + 1.5)))
for i, p in enumerate(DATA):
    start = mdates.date2num(to_date(aux(p, "start")))
    ax.barh(i, float(aux(p, "duration")), left=start, height=0.6,
            color=color_at(phases.index(phase_of(p))), alpha=ALPHA,
            edgecolor=EDGE, linewidth=EDGE_WIDTH)
set_category_ticks(ax, tasks, axis="y")
ax.invert_yaxis()
ax.xaxis_date()
ax.xaxis.set_major_formatter(mdates.DateFormatter("%b %d"))
if len(phases) > 1:
    ax.legend(handles=[Patch(color=color_at(i), label=name) for i, name in enumerate(phases)],
              loc="lower right")
fig.autofmt_xdate()
finish(ax)
"##;

const STACKED_AREA: &str = r##"xs, names, table = series_table()
x = list(range(len(xs)))
fig, ax = plt.subplots(figsize=(10, 6))
ax.stackplot(x, *[table[name] for name in names], labels=names,
             colors=[color_at(i) for i in range(len(names))], alpha=ALPHA,
             edgecolor=EDGE, linewidth=0.5)
set_category_ticks(ax, xs)
ax.legend(loc="upper left")
finish(ax, None, "Value")
"##;

const GROUPED_BAR: &str = r##"xs, names, table = series_table()
width = 0.8 / len(names)
fig, ax = plt.subplots(figsize=(11, 6))
for i, name in enumerate(names):
    offsets = [j + (i - (len(names) - 1) / 2) * width for j in range(len(xs))]
    ax.bar(offsets, table[name], width=width, label=name, color=color_at(i), alpha=ALPHA,
           edgecolor=EDGE, linewidth=EDGE_WIDTH)
set_category_ticks(ax, xs)
ax.grid(axis="x", visible=False)
ax.legend()
finish(ax, None, "Value")
"##;

const STACKED_BAR: &str = r##"xs, names, table = series_table()
x = list(range(len(xs)))
bottoms = [0.0] * len(xs)
fig, ax = plt.subplots(figsize=(11, 6))
for i, name in enumerate(names):
    ax.bar(x, table[name], bottom=bottoms, label=name, color=color_at(i), alpha=ALPHA,
           edgecolor=EDGE, linewidth=EDGE_WIDTH, width=0.6)
    bottoms = [b + v for b, v in zip(bottoms, table[name])]
set_category_ticks(ax, xs)
ax.grid(axis="x", visible=False)
ax.legend()
finish(ax, None, "Value")
"##;

const STEP: &str = r##"labels, values = labels_and_values()
x = list(range(len(values)))
fig, ax = plt.subplots(figsize=(10, 6))
ax.step(x, values, where="post", color=COLORS[0], linewidth=2.2)
ax.fill_between(x, values, step="post", color=COLORS[0], alpha=ALPHA * 0.2)
ax.plot(x, values, "o", color=COLORS[0], markeredgecolor=EDGE, markersize=5)
set_category_ticks(ax, labels)
finish(ax, None, "Value")
"##;

const AREA: &str = r##"labels, values = labels_and_values()
x = list(range(len(values)))
fig, ax = plt.subplots(figsize=(10, 6))
ax.fill_between(x, values, color=COLORS[0], alpha=ALPHA * 0.5)
ax.plot(x, values, color=EDGE, linewidth=2)
set_category_ticks(ax, labels)
finish(ax, None, "Value")
"##;

const TREEMAP: &str = r##"def worst_ratio(row, side):
    total = sum(row)
    return max(max(side * side * v / (total * total), (total * total) / (side * side * v)) for v in row)


def squarify(sizes, x, y, w, h):
    rects = []
    sizes = list(sizes)
    while sizes:
        side = min(w, h)
        row = [sizes.pop(0)]
        while sizes and worst_ratio(row + [sizes[0]], side) <= worst_ratio(row, side):
            row.append(sizes.pop(0))
        thickness = sum(row) / side
        offset = 0.0
        for v in row:
            length = v / thickness
            if w >= h:
                rects.append((x, y + offset, thickness, length))
            else:
                rects.append((x + offset, y, length, thickness))
            offset += length
        if w >= h:
            x += thickness
            w -= thickness
        else:
            y += thickness
            h -= thickness
    return rects


WIDTH, HEIGHT = 100.0, 60.0
pairs = sorted(((label, value) for label, value in zip(*labels_and_values()) if value > 0),
               key=lambda kv: kv[1], reverse=True)
total = sum(value for _, value in pairs)
areas = [value * WIDTH * HEIGHT / total for _, value in pairs] if total else []
fig, ax = plt.subplots(figsize=(11, 6.6))
for i, ((label, value), (rx, ry, rw, rh)) in enumerate(zip(pairs, squarify(areas, 0.0, 0.0, WIDTH, HEIGHT))):
    ax.add_patch(Rectangle((rx, ry), rw, rh, facecolor=color_at(i), alpha=ALPHA,
                           edgecolor=EDGE, linewidth=EDGE_WIDTH))
    if rw * rh > WIDTH * HEIGHT * 0.02:
        ax.text(rx + rw / 2, ry + rh / 2, "{}\n{:,.0f}".format(label, value),
                ha="center", va="center", fontsize=10, color="white", fontweight="bold")
ax.set_xlim(0, WIDTH)
ax.set_ylim(0, HEIGHT)
ax.axis("off")
finish(ax)
"##;

fn body_for(chart_type: ChartType) -> &'static str {
    match chart_type {
        ChartType::Line => LINE,
        ChartType::BarVertical => BAR_VERTICAL,
        ChartType::BarHorizontal => BAR_HORIZONTAL,
        ChartType::Histogram => HISTOGRAM,
        ChartType::BoxPlot => BOX_PLOT,
        ChartType::ViolinPlot => VIOLIN_PLOT,
        ChartType::Scatter => SCATTER,
        ChartType::Bubble => BUBBLE,
        ChartType::Hexbin => HEXBIN,
        ChartType::Pie => PIE,
        ChartType::Waterfall => WATERFALL,
        ChartType::Funnel => FUNNEL,
        ChartType::Radar => RADAR,
        ChartType::Heatmap => HEATMAP,
        ChartType::ErrorBar => ERROR_BAR,
        ChartType::ControlChart => CONTROL_CHART,
        ChartType::Pareto => PARETO,
        ChartType::Gantt => GANTT,
        ChartType::StackedArea => STACKED_AREA,
        ChartType::GroupedBar => GROUPED_BAR,
        ChartType::StackedBar => STACKED_BAR,
        ChartType::Step => STEP,
        ChartType::Area => AREA,
        ChartType::Treemap => TREEMAP,
    }
}

/// A JSON document as a Python string literal.
///
/// JSON string escapes are a subset of Python's, so serializing the document
/// text as a JSON string gives a valid Python literal.
fn python_json_literal(value: &impl serde::Serialize) -> Result<String, AppError> {
    let document = serde_json::to_string(value)?;
    Ok(serde_json::to_string(&document)?)
}

/// Full matplotlib program for `chart_type`. `points` must already satisfy
/// `validate_points`.
pub fn render_source(
    chart_type: ChartType,
    points: &[DataPoint],
    style: &StyleRecord,
    options: &TemplateOptions,
) -> Result<String, AppError> {
    let data = python_json_literal(&points)?;
    let style = python_json_literal(&style.to_template_json()?)?;
    let options = python_json_literal(options)?;

    let preamble = PREAMBLE
        .replace("@@DATA@@", &data)
        .replace("@@STYLE@@", &style)
        .replace("@@OPTIONS@@", &options);

    let mut source = String::with_capacity(preamble.len() + 4096);
    source.push_str(&preamble);
    source.push_str(body_for(chart_type));
    source.push_str(EPILOGUE);
    Ok(source)
}
