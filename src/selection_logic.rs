// src/selection_logic.rs
// 纯逻辑：不依赖 minifb，只负责选区状态机

use crate::geometry::{Point, Rect};

/// 覆盖层送进来的离散输入事件，坐标都是虚拟屏幕坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    PrimaryDown(Point),
    PointerMove(Point),
    PrimaryUp(Point),
    SecondaryClick,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Dragging { anchor: Point, rect: Rect },
    Finalized(Rect),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    state: SelectionState,
    min_size: u32,
}

impl Selection {
    pub fn new(min_size: u32) -> Self {
        Selection { state: SelectionState::Idle, min_size }
    }

    #[cfg(test)]
    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, SelectionState::Finalized(_) | SelectionState::Cancelled)
    }

    /// 当前需要绘制的矩形（拖拽中或已完成）
    pub fn visible_rect(&self) -> Option<Rect> {
        match self.state {
            SelectionState::Dragging { rect, .. } | SelectionState::Finalized(rect) => Some(rect),
            _ => None,
        }
    }

    /// 终态：Some(rect) 表示选区完成，None 表示取消
    pub fn outcome(&self) -> Option<Option<Rect>> {
        match self.state {
            SelectionState::Finalized(rect) => Some(Some(rect)),
            SelectionState::Cancelled => Some(None),
            _ => None,
        }
    }

    /// 处理一个事件，返回状态是否改变（改变了就需要重绘）
    pub fn handle(&mut self, event: SelectionEvent) -> bool {
        use SelectionEvent::*;
        use SelectionState::*;

        let next = match (self.state, event) {
            // 终态吸收所有后续事件
            (Finalized(_) | Cancelled, _) => return false,
            (_, SecondaryClick | Escape) => Cancelled,
            (Idle, PrimaryDown(p)) => Dragging { anchor: p, rect: Rect::from_points(p, p) },
            (Dragging { anchor, .. }, PointerMove(p)) => {
                Dragging { anchor, rect: Rect::from_points(anchor, p) }
            }
            (Dragging { anchor, .. }, PrimaryUp(p)) => {
                let rect = Rect::from_points(anchor, p);
                if rect.w >= self.min_size && rect.h >= self.min_size {
                    Finalized(rect)
                } else {
                    // 误点：当作什么都没发生，而不是截一个 1x1
                    Cancelled
                }
            }
            _ => return false,
        };

        let changed = next != self.state;
        if changed {
            log::debug!("selection {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        changed
    }
}
