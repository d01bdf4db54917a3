//! 만료 레코드 정리 스케줄러
//!
//! 읽기 시점 필터가 정확성을 보장하므로, 여기서는 저장 공간만 제한한다.

use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// 한 번의 정리 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub players: usize,
    pub rooms: usize,
}

pub struct Sweeper {
    state: Arc<AppState>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        let interval = state.config.sweep_interval();
        Self { state, interval }
    }

    /// 두 네임스페이스를 한 번 정리한다. 한쪽 실패가 다른 쪽을 막지 않는다.
    pub async fn run_once(&self) -> SweepReport {
        let (players, rooms) = tokio::join!(
            self.state.presence.sweep(),
            self.state.signaling.sweep()
        );

        let report = SweepReport {
            players: players.unwrap_or_else(|err| {
                tracing::error!(error = %err, "Presence sweep failed");
                0
            }),
            rooms: rooms.unwrap_or_else(|err| {
                tracing::error!(error = %err, "Signaling sweep failed");
                0
            }),
        };

        if report.players > 0 || report.rooms > 0 {
            tracing::info!(
                evicted_players = report.players,
                evicted_rooms = report.rooms,
                "Cleanup completed"
            );
        }
        report
    }

    /// 고정 주기로 정리 루프를 띄운다.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }
}
