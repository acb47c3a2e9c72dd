//! Main egui application with the avatar viewport.

use std::sync::Arc;
use std::time::Instant;

use eframe::egui;

use crate::avatar::AvatarModel;
use crate::config::{Config, RigTuning, ViewerConfig};
use crate::rig::{BoneRig, LandmarkSmoother, RigSolver, SmoothingMode};
use crate::tracking::PoseReport;
use crate::AppState;

use super::overlay;
use super::renderer::AvatarRenderer;
use super::skinning;
use super::viewport::AvatarViewportCallback;

/// The native egui application window.
pub struct PoseMirrorApp {
    state: Arc<AppState>,
    /// Broadcast receiver for pose updates (sync-safe via try_recv)
    pose_rx: tokio::sync::broadcast::Receiver<PoseReport>,
    /// Latest pose report (updated each frame via try_recv)
    cached_pose: PoseReport,
    /// When the latest report arrived
    pose_received_at: Option<Instant>,
    /// Avatar model (loaded once)
    model: Option<Arc<AvatarModel>>,
    /// GPU renderer (created from wgpu render state)
    renderer: Option<Arc<AvatarRenderer>>,
    /// Landmark → bone rotation solver
    solver: Option<RigSolver>,
    /// Current driven pose
    rig: Option<BoneRig>,
    /// Pre-solve landmark smoother
    smoother: LandmarkSmoother,
    /// Rigging tuning snapshot
    tuning: RigTuning,
    overlay_enabled: bool,
    mirror_overlay: bool,
    /// Error message if model failed to load
    load_error: Option<String>,
}

impl PoseMirrorApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: Arc<AppState>) -> Self {
        let pose_rx = state.subscribe_pose();
        let config = read_config_blocking(&state);

        let mut app = Self {
            state,
            pose_rx,
            cached_pose: PoseReport::default(),
            pose_received_at: None,
            model: None,
            renderer: None,
            solver: None,
            rig: None,
            smoother: LandmarkSmoother::new(SmoothingMode::from_str(
                &config.rigging.smoothing_mode,
            )),
            tuning: config.rigging.clone(),
            overlay_enabled: config.viewer.overlay_enabled,
            mirror_overlay: config.viewer.mirror_overlay,
            load_error: None,
        };

        app.init_avatar(cc, &config);

        app
    }

    fn init_avatar(&mut self, cc: &eframe::CreationContext<'_>, config: &Config) {
        let render_state = match cc.wgpu_render_state.as_ref() {
            Some(rs) => rs,
            None => {
                self.load_error = Some("wgpu render state not available".to_string());
                return;
            }
        };

        let model_path = &config.avatar.model_path;

        let model = match AvatarModel::load(model_path) {
            Ok(m) => {
                tracing::info!(
                    "Avatar model loaded: {} meshes, {} nodes, {} humanoid bones",
                    m.meshes.len(),
                    m.node_count,
                    m.bone_to_node.len()
                );
                Arc::new(m)
            }
            Err(e) => {
                self.load_error = Some(format!("Failed to load avatar model: {}", e));
                tracing::error!("{}", self.load_error.as_ref().unwrap());
                return;
            }
        };

        let solver = RigSolver::from_model(&model);
        if solver.is_none() {
            tracing::warn!("Model has no solvable humanoid rig, avatar will stay in rest pose");
        }

        let device = &render_state.device;
        let queue = &render_state.queue;
        let target_format = render_state.target_format;

        let renderer = Arc::new(AvatarRenderer::new(
            device,
            queue,
            target_format,
            &model,
            800,
            600,
        ));

        // Initial upload with the rest pose
        let rig = BoneRig::new(&model);
        let world = model.world_transforms(rig.rotations(), &rig.translations());
        let mut skinned_meshes = Vec::with_capacity(model.meshes.len());
        for mesh_idx in 0..model.meshes.len() {
            let base = skinning::base_positions(&model, mesh_idx);
            skinned_meshes.push(skinning::skin_vertices(&model, mesh_idx, &base, &world));
        }
        renderer.update_vertices(queue, &model, &skinned_meshes);

        self.model = Some(model);
        self.renderer = Some(renderer);
        self.solver = solver;
        self.rig = Some(rig);
    }

    /// Launch the native UI window. Blocks until the window is closed.
    pub fn run(state: Arc<AppState>) -> eframe::Result {
        let viewer: ViewerConfig = read_config_blocking(&state).viewer;

        let options = eframe::NativeOptions {
            renderer: eframe::Renderer::Wgpu,
            viewport: egui::ViewportBuilder::default()
                .with_title("posemirror")
                .with_inner_size([viewer.window_width, viewer.window_height]),
            ..Default::default()
        };

        eframe::run_native(
            "posemirror",
            options,
            Box::new(move |cc| Ok(Box::new(Self::new(cc, state)))),
        )
    }

    /// Drain the broadcast channel and cache the latest report.
    ///
    /// Returns true when a new report arrived this frame. Intermediate
    /// reports are dropped: only the newest one drives the rig.
    fn update_cached_pose(&mut self) -> bool {
        let mut got_new = false;
        loop {
            match self.pose_rx.try_recv() {
                Ok(report) => {
                    self.cached_pose = report;
                    got_new = true;
                }
                Err(tokio::sync::broadcast::error::TryRecvError::Empty) => break,
                Err(tokio::sync::broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::debug!("Pose receiver lagged by {} reports", n);
                    // Continue draining
                }
                Err(tokio::sync::broadcast::error::TryRecvError::Closed) => break,
            }
        }
        got_new
    }

    /// Advance the rig one damped step toward the newest detection result.
    fn advance_rig(&mut self) {
        let (model, solver, rig) = match (&self.model, &self.solver, &mut self.rig) {
            (Some(m), Some(s), Some(r)) => (m, s, r),
            _ => return,
        };

        let dt = self
            .pose_received_at
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(1.0 / 30.0)
            .clamp(0.001, 0.25);
        self.pose_received_at = Some(Instant::now());

        let smoothed = self.smoother.smooth(&self.cached_pose, dt, &self.tuning);
        let targets = solver.solve(model, &smoothed, &self.tuning);
        rig.advance(model, &targets, &self.tuning);
    }

    /// Re-skin the avatar from the rig's current pose and upload vertices.
    fn update_skinning(&self, render_state: &eframe::egui_wgpu::RenderState) {
        let (model, renderer, rig) = match (&self.model, &self.renderer, &self.rig) {
            (Some(m), Some(re), Some(ri)) => (m, re, ri),
            _ => return,
        };

        let world = model.world_transforms(rig.rotations(), &rig.translations());

        let mut skinned_meshes = Vec::with_capacity(model.meshes.len());
        for mesh_idx in 0..model.meshes.len() {
            let base = skinning::base_positions(model, mesh_idx);
            skinned_meshes.push(skinning::skin_vertices(model, mesh_idx, &base, &world));
        }

        renderer.update_vertices(&render_state.queue, model, &skinned_meshes);
    }
}

impl eframe::App for PoseMirrorApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        // Drain latest report; advance the rig once per detection result
        if self.update_cached_pose() && self.cached_pose.detected {
            self.advance_rig();
        }

        if let Some(render_state) = frame.wgpu_render_state() {
            self.update_skinning(render_state);
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.label("posemirror");
                ui.separator();
                ui.label("webcam pose mirror");
            });
        });

        egui::SidePanel::left("status").show(ctx, |ui| {
            ui.heading("Status");
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Tracker:");
                if self.state.is_tracker_alive() {
                    ui.colored_label(egui::Color32::GREEN, "running");
                } else {
                    ui.colored_label(egui::Color32::RED, "stopped");
                }
            });

            ui.horizontal(|ui| {
                ui.label("Pose:");
                if self.cached_pose.detected {
                    ui.colored_label(egui::Color32::GREEN, "detected");
                } else {
                    ui.colored_label(egui::Color32::GRAY, "no pose");
                }
            });

            if let Some(at) = self.pose_received_at {
                ui.label(format!("Last update: {} ms ago", at.elapsed().as_millis()));
            }

            if self.cached_pose.detected {
                ui.label(format!(
                    "Visible landmarks: {}/{}",
                    self.cached_pose.visible_count(self.tuning.visibility_threshold),
                    crate::tracking::PoseLandmark::COUNT,
                ));
            }

            if let Some(model) = &self.model {
                ui.separator();
                ui.label(format!("Meshes: {}", model.meshes.len()));
                ui.label(format!("Bones: {}", model.bone_to_node.len()));
            }

            ui.separator();
            ui.checkbox(&mut self.overlay_enabled, "Landmark guide");
            ui.checkbox(&mut self.mirror_overlay, "Mirror guide");

            if let Some(ref err) = self.load_error {
                ui.separator();
                ui.colored_label(egui::Color32::RED, err);
            }
        });

        if self.overlay_enabled {
            egui::SidePanel::right("landmark_guide")
                .default_width(260.0)
                .show(ctx, |ui| {
                    ui.heading("Landmark guide");
                    ui.separator();

                    // 4:3 guide area matching the capture aspect
                    let width = ui.available_width();
                    let size = egui::Vec2::new(width, width * 0.75);
                    let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

                    overlay::draw_pose_overlay(
                        ui.painter(),
                        rect,
                        &self.cached_pose,
                        self.mirror_overlay,
                        self.tuning.visibility_threshold,
                    );
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(renderer) = &self.renderer {
                let available_size = ui.available_size();
                let (rect, _response) =
                    ui.allocate_exact_size(available_size, egui::Sense::hover());

                let ppp = ctx.pixels_per_point();
                let vp_width = (available_size.x * ppp) as u32;
                let vp_height = (available_size.y * ppp) as u32;

                ui.painter().add(eframe::egui_wgpu::Callback::new_paint_callback(
                    rect,
                    AvatarViewportCallback {
                        renderer: renderer.clone(),
                        viewport_width: vp_width.max(1),
                        viewport_height: vp_height.max(1),
                    },
                ));
            } else {
                ui.heading("Avatar");
                if let Some(ref err) = self.load_error {
                    ui.colored_label(egui::Color32::RED, err);
                } else {
                    ui.label("Loading avatar model...");
                }
            }
        });

        // Repaint continuously so the render loop runs every display frame
        ctx.request_repaint();
    }
}

/// Read the config from a sync context.
///
/// Inside the tokio runtime this blocks in place; outside it (e.g. tests)
/// the defaults are returned.
fn read_config_blocking(state: &Arc<AppState>) -> Config {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| {
            handle.block_on(async { state.config.read().await.clone() })
        }),
        Err(_) => Config::default(),
    }
}
