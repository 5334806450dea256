//! Properties and logger access on Communicator.

use std::sync::Arc;

use crate::error::Result;
use crate::logger::Logger;
use crate::properties::Properties;
use crate::Communicator;

impl Communicator {
    /// The property store shared by everything in this runtime.
    pub fn properties(&self) -> Result<Arc<Properties>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.properties().clone())
    }

    pub fn logger(&self) -> Result<Arc<dyn Logger>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.logger())
    }

    /// Replace the logger. Also used for the destroy-not-called warning.
    pub fn set_logger(&self, logger: Arc<dyn Logger>) -> Result<()> {
        let _guard = self.lock_active()?;
        self.instance.set_logger(logger);
        Ok(())
    }
}
